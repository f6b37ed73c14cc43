//! Validate configuration command.

use anyhow::Result;
use desk_config::load_config;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_config(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Initial mode: {}", config.engine.initial_mode);
            println!(
                "Gateway: {}:{} (client id {})",
                config.broker.gateway_host, config.broker.gateway_port, config.broker.client_id
            );
            println!("Sim capital: {}", config.backtest.initial_capital);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
