//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, BacktestSettings, BrokerSettings, EngineSettings, LoggingSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables prefixed with `TRADEDESK` override file values,
/// e.g. `TRADEDESK__ENGINE__INITIAL_MODE=live`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADEDESK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
