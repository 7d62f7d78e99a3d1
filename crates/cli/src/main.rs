//! # Event Relay CLI
//!
//! Entry point of the `event-relay` binary.
//!
//! Provides:
//! - Configuration loading and validation
//! - Relay lifecycle (distributors, routes, sessions)
//! - Graceful shutdown with a delivery summary

mod cli;
mod commands;
mod relay;

use anyhow::Result;
use clap::Parser;
use observability::{LogFormat, LogWriter, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_relay, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Event Relay CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_relay(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// Logs go to stderr; stdout carries command output.
fn init_logging(cli: &Cli) -> Result<()> {
    let log_format = match cli.log_format {
        cli::LogFormat::Json => LogFormat::Json,
        cli::LogFormat::Pretty => LogFormat::Pretty,
        cli::LogFormat::Compact => LogFormat::Compact,
    };
    let (log_level, use_env_filter) = if cli.quiet {
        ("warn", false)
    } else {
        match cli.verbose {
            0 => ("info", true),
            1 => ("debug", true),
            _ => ("trace", true),
        }
    };

    observability::init_with_config(&ObservabilityConfig {
        log_format,
        log_level: log_level.to_string(),
        use_env_filter,
        writer: LogWriter::Stderr,
    })
}
