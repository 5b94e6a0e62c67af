//! Driftnet CLI - Command-line interface
//!
//! Resolves and extracts media links, mirrors them into the local object
//! store and runs the cache reaper.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use driftnet_core::DriftnetError;
use driftnet_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "driftnet")]
#[command(about = "Media link extraction and caching")]
struct Cli {
    /// Console log level (the log file always records everything)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_tracing_level(), None) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match commands::handle_command(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<DriftnetError>() {
            Some(error) if error.is_user_error() => {
                eprintln!("{}", error.user_message());
                ExitCode::from(2)
            }
            _ => {
                tracing::error!("Command failed: {:#}", e);
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}
