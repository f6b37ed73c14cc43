//! Configuration structures.

use desk_core::Mode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "tradedesk".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Backend the session starts in
    pub initial_mode: Mode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Backtest,
        }
    }
}

/// Vendor gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub gateway_host: String,
    pub gateway_port: u16,
    /// Client id this session identifies as at the gateway
    pub client_id: u32,
    pub account: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 7497,
            client_id: 1,
            account: String::new(),
        }
    }
}

/// Simulator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    pub account: String,
    pub initial_capital: Decimal,
    pub commission_per_share: Decimal,
    /// Width of the historical bars, e.g. "1m"
    pub bar_interval: String,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            account: "SIM".to_string(),
            initial_capital: dec!(100000),
            commission_per_share: Decimal::ZERO,
            bar_interval: "1m".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.initial_mode, Mode::Backtest);
        assert_eq!(config.backtest.initial_capital, dec!(100000));
        assert_eq!(config.broker.gateway_port, 7497);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            initial_mode = "live"

            [broker]
            gateway_host = "10.0.0.5"
            gateway_port = 4001
            client_id = 7
            account = "DU000001"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.initial_mode, Mode::Live);
        assert_eq!(config.broker.gateway_host, "10.0.0.5");
        // Untouched sections keep their defaults.
        assert_eq!(config.backtest.account, "SIM");
        assert_eq!(config.logging.level, "info");
    }
}
