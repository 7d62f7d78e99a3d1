//! DistributorCore - bookkeeping shared by every adapter
//!
//! Holds the health state machine, traffic counters and the shallow-mergeable
//! configuration. Adapters embed one and expose it through
//! [`Distributor::core`](crate::Distributor::core); the trait's default
//! methods read from it.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::{DistributorStats, HealthSnapshot, HealthStatus};

/// Config key that toggles a distributor
pub const ENABLED_KEY: &str = "enabled";

/// Bookkeeping state of a single distributor
#[derive(Debug)]
pub struct DistributorCore {
    name: String,
    config: RwLock<Map<String, Value>>,
    enabled: AtomicBool,
    status: Mutex<HealthStatus>,
    last_error: Mutex<Option<String>>,
    created_at: Instant,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    errors: AtomicU64,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

impl DistributorCore {
    /// Create a core in the `Initializing` state
    pub fn new(name: impl Into<String>, config: Map<String, Value>) -> Self {
        let enabled = enabled_from(&config);
        Self {
            name: name.into(),
            config: RwLock::new(config),
            enabled: AtomicBool::new(enabled),
            status: Mutex::new(HealthStatus::Initializing),
            last_error: Mutex::new(None),
            created_at: Instant::now(),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_activity: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ===== Health state machine =====

    /// Current status
    pub fn status(&self) -> HealthStatus {
        *self.status.lock()
    }

    /// Move to `next`
    ///
    /// Returns false (and leaves the state untouched) once `Stopped`.
    pub fn transition(&self, next: HealthStatus) -> bool {
        let mut status = self.status.lock();
        if status.is_terminal() {
            debug!(
                distributor = %self.name,
                requested = %next,
                "Ignoring transition after stop"
            );
            return next.is_terminal();
        }
        *status = next;
        true
    }

    pub fn mark_connected(&self) -> bool {
        let moved = self.transition(HealthStatus::Connected);
        if moved {
            *self.last_error.lock() = None;
        }
        moved
    }

    pub fn mark_disconnected(&self) -> bool {
        self.transition(HealthStatus::Disconnected)
    }

    /// Move to `Error`, remembering the cause
    pub fn mark_error(&self, message: impl Into<String>) -> bool {
        *self.last_error.lock() = Some(message.into());
        self.transition(HealthStatus::Error)
    }

    pub fn mark_stopped(&self) {
        self.transition(HealthStatus::Stopped);
    }

    pub fn is_stopped(&self) -> bool {
        self.status().is_terminal()
    }

    // ===== Counters =====

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Count a failed operation without changing connectivity state
    pub fn record_error(&self, message: impl Into<String>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(message.into());
        self.touch();
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        *self.last_activity.lock() = Some(Utc::now());
    }

    pub fn uptime_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    // ===== Config =====

    /// Copy of the current configuration
    pub fn config(&self) -> Map<String, Value> {
        self.config.read().clone()
    }

    /// Read a single config value
    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.config.read().get(key).cloned()
    }

    /// Shallow merge `partial` into the config and re-derive `enabled`
    pub fn merge_config(&self, partial: Map<String, Value>) {
        let mut config = self.config.write();
        for (key, value) in partial {
            config.insert(key, value);
        }
        self.enabled.store(enabled_from(&config), Ordering::Relaxed);
        debug!(distributor = %self.name, keys = config.len(), "Config updated");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    // ===== Snapshots =====

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            name: self.name.clone(),
            status: self.status(),
            uptime_ms: self.uptime_ms(),
            last_check: Utc::now(),
            enabled: self.is_enabled(),
            last_error: self.last_error.lock().clone(),
        }
    }

    pub fn stats(&self) -> DistributorStats {
        DistributorStats {
            name: self.name.clone(),
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            errors: self.errors(),
            last_activity: *self.last_activity.lock(),
            uptime_ms: self.uptime_ms(),
        }
    }
}

fn enabled_from(config: &Map<String, Value>) -> bool {
    config
        .get(ENABLED_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn stopped_is_terminal() {
        let core = DistributorCore::new("udp", Map::new());
        assert_eq!(core.status(), HealthStatus::Initializing);

        assert!(core.mark_connected());
        core.mark_stopped();
        assert!(!core.mark_connected());
        assert!(!core.mark_error("late failure"));
        assert_eq!(core.status(), HealthStatus::Stopped);
    }

    #[test]
    fn merge_is_shallow_and_rederives_enabled() {
        let core = DistributorCore::new(
            "file",
            config(json!({ "path": "a.jsonl", "nested": { "x": 1, "y": 2 } })),
        );
        assert!(core.is_enabled());

        core.merge_config(config(json!({ "enabled": false, "nested": { "x": 5 } })));

        let merged = core.config();
        assert!(!core.is_enabled());
        assert_eq!(merged["path"], json!("a.jsonl"));
        assert_eq!(merged["nested"], json!({ "x": 5 }));

        core.merge_config(config(json!({ "enabled": true })));
        assert!(core.is_enabled());
    }

    #[test]
    fn counters_feed_stats() {
        let core = DistributorCore::new("log", Map::new());
        core.record_sent();
        core.record_sent();
        core.record_error("boom");

        let stats = core.stats();
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_activity.is_some());
        assert_eq!(core.health().last_error.as_deref(), Some("boom"));
    }
}
