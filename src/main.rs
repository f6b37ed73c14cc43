//! Tradedesk CLI application.

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

// EngineHandle calls block the calling thread, so main stays synchronous;
// the replay command builds the runtime the engine borrows.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level {
        cli::LogLevel::Trace => "trace",
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    logging::setup_logging(log_level, cli.json_logs);

    match cli.command {
        Commands::Replay(args) => cli::commands::replay::run(args, &cli.config),
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config),
    }
}
