//! # Observability
//!
//! Tracing + Prometheus metrics for the relay.
//!
//! ## Features
//!
//! - Tracing initialization (JSON / Pretty / Compact)
//! - Prometheus metrics export
//! - In-memory delivery aggregation for run summaries
//!
//! ## Usage
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! observability::init_with_config(&ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//! observability::init_metrics_only(9000)?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_delivery, record_distribution, record_health, record_retries,
    record_session_distribution, set_active_sessions, DeliveryMetricsAggregator,
    DeliverySummary, RunningStats, StatsSummary,
};

/// Tracing setup of a relay process
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Directive used when `RUST_LOG` is unset or ignored
    pub log_level: String,
    /// Let `RUST_LOG` override `log_level`
    pub use_env_filter: bool,
    pub writer: LogWriter,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            log_level: "info".to_string(),
            use_env_filter: true,
            writer: LogWriter::Stderr,
        }
    }
}

impl ObservabilityConfig {
    /// Filter this config resolves to
    pub fn filter(&self) -> EnvFilter {
        if self.use_env_filter {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }
        EnvFilter::new(&self.log_level)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
}

/// Stream the fmt layer writes to
///
/// Relay responses go to stdout, so logs default to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogWriter {
    Stdout,
    #[default]
    Stderr,
}

impl LogWriter {
    fn make_writer(self) -> BoxMakeWriter {
        match self {
            Self::Stdout => BoxMakeWriter::new(std::io::stdout),
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Install the global tracing subscriber
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_with_config(config: &ObservabilityConfig) -> Result<()> {
    let writer = config.writer.make_writer();
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        log_format = ?config.log_format,
        writer = ?config.writer,
        "Tracing initialized"
    );
    Ok(())
}

/// Install only the Prometheus recorder
///
/// For hosts that already own the tracing subscriber.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_logs_to_stderr() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.writer, LogWriter::Stderr);
        assert!(config.use_env_filter);
    }

    #[test]
    fn test_fixed_level_ignores_env() {
        let config = ObservabilityConfig {
            log_level: "warn".to_string(),
            use_env_filter: false,
            ..Default::default()
        };
        assert_eq!(config.filter().to_string(), "warn");
    }

    #[test]
    fn test_subscriber_installs_once() {
        let config = ObservabilityConfig {
            log_format: LogFormat::Compact,
            ..Default::default()
        };
        assert!(init_with_config(&config).is_ok());
        assert!(init_with_config(&config).is_err());
    }
}
