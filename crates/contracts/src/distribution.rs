//! Distribution data model
//!
//! Per-target results and the aggregated response returned to producers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::{ContractError, SendOptions};

/// Literal target name that expands to every enabled distributor
pub const ALL_TARGETS: &str = "all";

/// Outcome of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Error,
}

/// Result of dispatching one event to one distributor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub distributor: String,
    pub status: DeliveryStatus,

    /// Value returned by the distributor on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Final error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall time across all attempts, including backoff
    pub duration_ms: u64,

    /// Number of send attempts made
    pub attempts: u32,
}

impl DistributionResult {
    pub fn success(
        distributor: impl Into<String>,
        result: Value,
        duration: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            distributor: distributor.into(),
            status: DeliveryStatus::Success,
            result: Some(result),
            error: None,
            duration_ms: duration.as_millis() as u64,
            attempts,
        }
    }

    pub fn failure(
        distributor: impl Into<String>,
        error: &ContractError,
        duration: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            distributor: distributor.into(),
            status: DeliveryStatus::Error,
            result: None,
            error: Some(error.to_string()),
            duration_ms: duration.as_millis() as u64,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Success / failure counts of a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Aggregated outcome of one distribute call
///
/// The summary is always derived from `results`:
/// `summary.total == results.len()` and `successful + failed == total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResponse {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<DistributionResult>,
    pub summary: DistributionSummary,
}

impl DistributionResponse {
    pub fn new(event: impl Into<String>, results: Vec<DistributionResult>) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let total = results.len();
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            results,
            summary: DistributionSummary {
                total,
                successful,
                failed: total - successful,
            },
        }
    }

    /// Result for a specific distributor
    pub fn result_for(&self, distributor: &str) -> Option<&DistributionResult> {
        self.results.iter().find(|r| r.distributor == distributor)
    }

    /// True when every target succeeded (vacuously true for no targets)
    pub fn all_succeeded(&self) -> bool {
        self.summary.failed == 0
    }
}

/// Target selection for a distribute call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Targets {
    /// Every enabled distributor
    #[default]
    All,
    /// Explicit names, in order, without duplicates
    Named(Vec<String>),
}

impl Targets {
    /// Build from names; any `"all"` entry selects every distributor
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name == ALL_TARGETS {
                return Self::All;
            }
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self::Named(unique)
    }
}

impl From<&str> for Targets {
    fn from(name: &str) -> Self {
        Self::named([name])
    }
}

impl From<Vec<String>> for Targets {
    fn from(names: Vec<String>) -> Self {
        Self::named(names)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(names: Vec<&str>) -> Self {
        Self::named(names)
    }
}

/// Options of a distribute call
///
/// `send` applies to every target; `per_distributor` entries are layered on
/// top for the named distributor only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionOptions {
    #[serde(flatten)]
    pub send: SendOptions,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_distributor: HashMap<String, SendOptions>,
}

impl DistributionOptions {
    pub fn new(send: SendOptions) -> Self {
        Self {
            send,
            per_distributor: HashMap::new(),
        }
    }

    /// Add an override for a single distributor
    pub fn for_target(mut self, distributor: impl Into<String>, options: SendOptions) -> Self {
        self.per_distributor.insert(distributor.into(), options);
        self
    }

    /// Effective send options for `distributor`
    pub fn resolve(&self, distributor: &str) -> SendOptions {
        match self.per_distributor.get(distributor) {
            Some(specific) => self.send.overlay(specific),
            None => self.send.clone(),
        }
    }

    /// Shallow merge with `overrides` winning on conflicts
    pub fn overlay(&self, overrides: &DistributionOptions) -> DistributionOptions {
        let mut per_distributor = self.per_distributor.clone();
        for (name, options) in &overrides.per_distributor {
            per_distributor.insert(name.clone(), options.clone());
        }
        DistributionOptions {
            send: self.send.overlay(&overrides.send),
            per_distributor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;
    use serde_json::json;

    #[test]
    fn summary_is_derived_from_results() {
        let response = DistributionResponse::new(
            "ping",
            vec![
                DistributionResult::success("a", json!({}), Duration::from_millis(10), 1),
                DistributionResult::failure(
                    "b",
                    &ContractError::transport("boom"),
                    Duration::from_millis(3),
                    1,
                ),
            ],
        );

        assert_eq!(response.summary.total, 2);
        assert_eq!(response.summary.successful, 1);
        assert_eq!(response.summary.failed, 1);
        assert_eq!(response.result_for("b").unwrap().error.as_deref(), Some("boom"));
        assert!(!response.all_succeeded());
    }

    #[test]
    fn targets_expand_all_and_dedup() {
        assert_eq!(Targets::from("all"), Targets::All);
        assert_eq!(Targets::from(vec!["a", "all"]), Targets::All);
        assert_eq!(
            Targets::from(vec!["b", "a", "b"]),
            Targets::Named(vec!["b".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn per_distributor_options_layer_on_top() {
        let options = DistributionOptions::new(SendOptions::default().with_priority(Priority::Low))
            .for_target("mqtt", SendOptions::default().with_priority(Priority::High));

        assert_eq!(options.resolve("mqtt").priority(), Priority::High);
        assert_eq!(options.resolve("udp").priority(), Priority::Low);
    }

    #[test]
    fn options_deserialize_flat() {
        let options: DistributionOptions = serde_json::from_value(json!({
            "priority": "high",
            "per_distributor": { "udp": { "timeout_ms": 50 } }
        }))
        .unwrap();

        assert_eq!(options.send.priority(), Priority::High);
        assert_eq!(options.resolve("udp").timeout_ms, Some(50));
    }
}
