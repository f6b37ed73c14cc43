//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tradedesk")]
#[command(author, version, about = "Broker coordination engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a deterministic replay session against synthetic bars
    Replay(ReplayArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Ticker to replay
    #[arg(short, long, default_value = "AAPL")]
    pub symbol: String,

    /// Number of one-minute bars to generate
    #[arg(short, long, default_value_t = 48)]
    pub bars: u32,

    /// Quantity for the demo market order
    #[arg(short, long, default_value_t = 10)]
    pub quantity: u32,
}
