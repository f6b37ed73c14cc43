//! Backend mode selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The active execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Vendor broker connection
    Live,
    /// Deterministic simulator
    #[default]
    Backtest,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Backtest => write!(f, "backtest"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "backtest" | "sim" => Ok(Mode::Backtest),
            _ => Err(format!("Invalid mode: {}", s)),
        }
    }
}
