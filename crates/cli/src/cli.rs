//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Event Relay - multi-transport event distribution
#[derive(Parser, Debug)]
#[command(
    name = "event-relay",
    author,
    version,
    about = "Multi-transport event relay",
    long_about = "Fans events out to a configured set of distributors (log, UDP, file, memory).\n\n\
                  Loads a relay configuration, registers its distributors, routes and sessions,\n\
                  then relays newline-delimited JSON events read from stdin or a file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENT_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVENT_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relay events to the configured distributors
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "EVENT_RELAY_CONFIG")]
    pub config: PathBuf,

    /// Newline-delimited JSON events to relay (default: stdin)
    #[arg(short, long, env = "EVENT_RELAY_INPUT")]
    pub input: Option<PathBuf>,

    /// Send events without explicit targets through the routing table
    #[arg(long)]
    pub route: bool,

    /// Stop after this many events (0 = unlimited)
    #[arg(long, default_value = "0", env = "EVENT_RELAY_MAX_EVENTS")]
    pub max_events: u64,

    /// Relay timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "EVENT_RELAY_TIMEOUT")]
    pub timeout: u64,

    /// Do not print per-event responses
    #[arg(long)]
    pub summary_only: bool,

    /// Validate configuration and exit without relaying
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "EVENT_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show distributor settings
    #[arg(long)]
    pub distributors: bool,

    /// Show session configuration
    #[arg(long)]
    pub sessions: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
