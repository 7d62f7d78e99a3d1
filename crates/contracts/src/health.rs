//! Health and statistics model
//!
//! Point-in-time reads exposed by every distributor and the aggregate
//! report produced by a health poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity state of a distributor
///
/// `Stopped` is terminal: once reached, no further transitions happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Initializing,
    Connected,
    Disconnected,
    Error,
    Stopped,
}

impl HealthStatus {
    /// Whether the distributor can currently accept traffic
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of a single distributor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Distributor name
    pub name: String,

    /// Current connectivity state
    pub status: HealthStatus,

    /// Milliseconds since the distributor was created
    pub uptime_ms: u64,

    /// When this snapshot was taken
    pub last_check: DateTime<Utc>,

    /// Whether the distributor is enabled by configuration
    pub enabled: bool,

    /// Most recent error message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthSnapshot {
    /// Snapshot describing a distributor whose health could not be read
    pub fn unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Error,
            uptime_ms: 0,
            last_check: Utc::now(),
            enabled: false,
            last_error: Some(message.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_live()
    }
}

/// Healthy / unhealthy counts of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Aggregate produced by one health poll
///
/// `summary.healthy + summary.unhealthy == summary.total == distributors.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub distributors: Vec<HealthSnapshot>,
    pub summary: HealthSummary,
}

impl HealthReport {
    /// Build a report, deriving the summary from the snapshots
    pub fn from_snapshots(distributors: Vec<HealthSnapshot>) -> Self {
        let healthy = distributors.iter().filter(|s| s.is_healthy()).count();
        let total = distributors.len();
        Self {
            timestamp: Utc::now(),
            distributors,
            summary: HealthSummary {
                total,
                healthy,
                unhealthy: total - healthy,
            },
        }
    }

    /// Names of the distributors that are not live
    pub fn unhealthy_names(&self) -> Vec<&str> {
        self.distributors
            .iter()
            .filter(|s| !s.is_healthy())
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Traffic counters of a single distributor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorStats {
    pub name: String,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub uptime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, status: HealthStatus) -> HealthSnapshot {
        HealthSnapshot {
            name: name.to_string(),
            status,
            uptime_ms: 10,
            last_check: Utc::now(),
            enabled: true,
            last_error: None,
        }
    }

    #[test]
    fn report_summary_counts_live_distributors() {
        let report = HealthReport::from_snapshots(vec![
            snapshot("a", HealthStatus::Connected),
            snapshot("b", HealthStatus::Error),
            snapshot("c", HealthStatus::Initializing),
        ]);

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.healthy, 1);
        assert_eq!(report.summary.unhealthy, 2);
        assert_eq!(report.unhealthy_names(), vec!["b", "c"]);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&HealthStatus::Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
        assert!(HealthStatus::Stopped.is_terminal());
        assert!(!HealthStatus::Error.is_live());
    }
}
