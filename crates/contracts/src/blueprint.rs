//! RelayBlueprint - Config Loader output
//!
//! Describes a complete relay deployment: coordinator tuning, the named
//! distributors to register, the event routing table and the sessions to
//! open at startup.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::{DistributionOptions, ENABLED_KEY};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Coordinator tuning
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Distributors registered on the coordinator
    #[serde(default)]
    pub distributors: Vec<DistributorSpec>,

    /// Event routing table
    #[serde(default)]
    pub routes: Vec<RouteSpec>,

    /// Sessions opened at startup
    #[serde(default)]
    pub sessions: Vec<SessionSpec>,
}

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Attempts per target per call (>= 1)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay of the linear backoff
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Health poll period
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    #[serde(default = "default_true")]
    pub enable_health_check: bool,

    /// Capacity of the notification channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            enable_health_check: true,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl CoordinatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Apply a partial update
    ///
    /// Returns true when a health-polling setting changed.
    pub fn apply(&mut self, patch: &CoordinatorConfigPatch) -> bool {
        let before = (self.enable_health_check, self.health_check_interval_ms);

        if let Some(attempts) = patch.retry_attempts {
            self.retry_attempts = attempts;
        }
        if let Some(delay) = patch.retry_delay_ms {
            self.retry_delay_ms = delay;
        }
        if let Some(interval) = patch.health_check_interval_ms {
            self.health_check_interval_ms = interval;
        }
        if let Some(enabled) = patch.enable_health_check {
            self.enable_health_check = enabled;
        }
        if let Some(capacity) = patch.event_channel_capacity {
            self.event_channel_capacity = capacity;
        }

        before != (self.enable_health_check, self.health_check_interval_ms)
    }
}

/// Partial coordinator update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfigPatch {
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub health_check_interval_ms: Option<u64>,
    #[serde(default)]
    pub enable_health_check: Option<bool>,
    #[serde(default)]
    pub event_channel_capacity: Option<usize>,
}

/// A named distributor built through the factory registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorSpec {
    /// Unique registration name
    pub name: String,

    /// Factory protocol (e.g. "udp", "file", "log")
    pub protocol: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Protocol-specific settings
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl DistributorSpec {
    /// Settings handed to the factory, with `enabled` folded in
    pub fn effective_config(&self) -> Map<String, Value> {
        let mut config = self.config.clone();
        config.insert(ENABLED_KEY.to_string(), Value::Bool(self.enabled));
        config
    }
}

/// One entry of the routing table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub event: String,

    /// Distributor names; "all" selects every enabled distributor
    pub targets: Vec<String>,

    #[serde(default)]
    pub options: DistributionOptions,
}

/// Configuration of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Protocol -> protocol settings
    #[serde(default)]
    pub distributors: BTreeMap<String, Map<String, Value>>,

    /// Routing key -> distributor ids (`{protocol}_{session_id}`)
    #[serde(default)]
    pub event_routing: HashMap<String, Vec<String>>,
}

impl SessionConfig {
    /// Add a protocol with its settings
    pub fn with_distributor(mut self, protocol: impl Into<String>, config: Map<String, Value>) -> Self {
        self.distributors.insert(protocol.into(), config);
        self
    }

    /// Add a routing entry
    pub fn with_route<I, S>(mut self, key: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_routing
            .insert(key.into(), ids.into_iter().map(Into::into).collect());
        self
    }
}

/// A session opened at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    pub id: String,

    #[serde(flatten)]
    pub config: SessionConfig,
}

/// Composite id of a session-scoped distributor
pub fn session_distributor_id(protocol: &str, session_id: &str) -> String {
    format!("{protocol}_{session_id}")
}
