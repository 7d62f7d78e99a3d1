//! Distributor trait - the transport capability contract
//!
//! Every transport adapter (HTTP, WebSocket, MQTT, UDP, SSE, custom) implements
//! [`Distributor`]. The coordinator and session manager only ever talk to
//! adapters through this trait, as `Arc<dyn Distributor>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::{ContractError, DistributorCore, DistributorStats, HealthSnapshot};

/// Delivery priority hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Per-send options
///
/// The common subset every transport understands, plus an open `extensions`
/// map for transport-specific keys. Every field is optional so options can be
/// layered (see [`SendOptions::overlay`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Per-send timeout in milliseconds, enforced by the distributor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    /// Set when the send is part of a broadcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Transport-specific keys
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl SendOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast.unwrap_or(false)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Shallow merge: every key set in `overrides` wins
    pub fn overlay(&self, overrides: &SendOptions) -> SendOptions {
        let mut extensions = self.extensions.clone();
        for (key, value) in &overrides.extensions {
            extensions.insert(key.clone(), value.clone());
        }

        SendOptions {
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            priority: overrides.priority.or(self.priority),
            broadcast: overrides.broadcast.or(self.broadcast),
            metadata: overrides.metadata.clone().or_else(|| self.metadata.clone()),
            extensions,
        }
    }
}

/// Explicit capability flags
///
/// Replaces runtime presence checks: a coordinator only registers adapters
/// that declare `send`, and only broadcasts through adapters that declare
/// `broadcast`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub send: bool,
    pub broadcast: bool,
    pub subscribe: bool,
}

impl Capabilities {
    pub const fn send_only() -> Self {
        Self {
            send: true,
            broadcast: false,
            subscribe: false,
        }
    }

    pub const fn with_broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    pub const fn with_subscribe(mut self) -> Self {
        self.subscribe = true;
        self
    }
}

/// Inbound message callback used by [`Distributor::subscribe`]
///
/// Receives the event name and its payload.
pub type EventCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Transport capability contract
///
/// Only [`Distributor::core`] and [`Distributor::connect`] are mandatory.
/// Everything else has a default built on the embedded [`DistributorCore`]:
///
/// - `send` fails with [`ContractError::NotImplemented`] so a half-built
///   adapter is loud, not silent
/// - `subscribe`/`unsubscribe` report `Ok(false)` (unsupported)
/// - `broadcast` delegates to `send` with `broadcast = true`
/// - `cleanup` disconnects then moves to the terminal `Stopped` state
///
/// Methods take `&self`: a distributor is shared across concurrent
/// dispatches, so adapters keep their mutable state behind interior
/// mutability.
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Bookkeeping core (health, stats, config)
    fn core(&self) -> &DistributorCore;

    /// Distributor name (used for logging/metrics)
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Declared capabilities
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Deliver one event
    ///
    /// # Errors
    /// Returns the transport failure; callers convert it into data.
    async fn send(
        &self,
        event: &str,
        data: &Value,
        options: &SendOptions,
    ) -> Result<Value, ContractError> {
        let _ = (event, data, options);
        Err(ContractError::not_implemented(self.name(), "send"))
    }

    /// Establish the transport connection
    async fn connect(&self) -> Result<(), ContractError>;

    /// Tear down the transport connection
    async fn disconnect(&self) -> Result<(), ContractError> {
        self.core().mark_disconnected();
        Ok(())
    }

    /// One-shot setup used by session-scoped instances
    async fn initialize(&self) -> Result<(), ContractError> {
        self.connect().await
    }

    /// Register an inbound callback for events matching `pattern`
    async fn subscribe(&self, pattern: &str, callback: EventCallback) -> Result<bool, ContractError> {
        let _ = callback;
        warn!(distributor = %self.name(), pattern, "Subscribe not supported");
        Ok(false)
    }

    /// Remove the callback registered for `pattern`
    async fn unsubscribe(&self, pattern: &str) -> Result<bool, ContractError> {
        warn!(distributor = %self.name(), pattern, "Unsubscribe not supported");
        Ok(false)
    }

    /// Deliver one event to every peer of this transport
    async fn broadcast(
        &self,
        event: &str,
        data: &Value,
        options: &SendOptions,
    ) -> Result<Value, ContractError> {
        let mut options = options.clone();
        options.broadcast = Some(true);
        self.send(event, data, &options).await
    }

    /// Health read; may touch the network for adapters that probe
    async fn health(&self) -> Result<HealthSnapshot, ContractError> {
        Ok(self.core().health())
    }

    /// Liveness gate used before session dispatch
    async fn is_healthy(&self) -> bool {
        matches!(self.health().await, Ok(snapshot) if snapshot.is_healthy())
    }

    fn stats(&self) -> DistributorStats {
        self.core().stats()
    }

    fn config(&self) -> Map<String, Value> {
        self.core().config()
    }

    /// Shallow merge into the current config
    fn update_config(&self, partial: Map<String, Value>) {
        self.core().merge_config(partial);
    }

    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Disconnect and move to `Stopped`; safe to call repeatedly
    async fn cleanup(&self) -> Result<(), ContractError> {
        if self.core().is_stopped() {
            return Ok(());
        }
        let result = self.disconnect().await;
        self.core().mark_stopped();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HealthStatus;
    use serde_json::json;

    struct Bare {
        core: DistributorCore,
    }

    #[async_trait]
    impl Distributor for Bare {
        fn core(&self) -> &DistributorCore {
            &self.core
        }

        async fn connect(&self) -> Result<(), ContractError> {
            self.core.mark_connected();
            Ok(())
        }
    }

    fn bare() -> Bare {
        Bare {
            core: DistributorCore::new("bare", Map::new()),
        }
    }

    #[tokio::test]
    async fn default_send_is_not_implemented() {
        let distributor = bare();
        let err = distributor
            .send("ping", &json!({}), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::NotImplemented { .. }));

        let err = distributor
            .broadcast("ping", &json!({}), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::NotImplemented { .. }));
    }

    #[tokio::test]
    async fn optional_capabilities_report_unsupported() {
        let distributor = bare();
        let callback: EventCallback = Arc::new(|_, _| {});
        assert!(!distributor.subscribe("alerts.*", callback).await.unwrap());
        assert!(!distributor.unsubscribe("alerts.*").await.unwrap());
        assert_eq!(distributor.capabilities(), Capabilities::default());
    }

    #[tokio::test]
    async fn lifecycle_and_idempotent_cleanup() {
        let distributor = bare();
        distributor.connect().await.unwrap();
        assert!(distributor.is_healthy().await);

        distributor.disconnect().await.unwrap();
        assert_eq!(distributor.core().status(), HealthStatus::Disconnected);

        distributor.cleanup().await.unwrap();
        distributor.cleanup().await.unwrap();
        assert_eq!(distributor.core().status(), HealthStatus::Stopped);

        distributor.connect().await.unwrap();
        assert_eq!(distributor.core().status(), HealthStatus::Stopped);
    }

    #[test]
    fn overlay_prefers_overrides() {
        let base = SendOptions {
            timeout_ms: Some(500),
            priority: Some(Priority::Low),
            broadcast: None,
            metadata: Some(Map::from_iter([("source".to_string(), json!("route"))])),
            extensions: Map::from_iter([
                ("qos".to_string(), json!(1)),
                ("retain".to_string(), json!(false)),
            ]),
        };
        let overrides = SendOptions {
            priority: Some(Priority::High),
            extensions: Map::from_iter([("qos".to_string(), json!(2))]),
            ..SendOptions::default()
        };

        let merged = base.overlay(&overrides);
        assert_eq!(merged.timeout(), Some(Duration::from_millis(500)));
        assert_eq!(merged.priority(), Priority::High);
        assert_eq!(merged.metadata, base.metadata);
        assert_eq!(merged.extensions["qos"], json!(2));
        assert_eq!(merged.extensions["retain"], json!(false));
    }

    #[test]
    fn send_options_keep_unknown_keys() {
        let options: SendOptions =
            serde_json::from_value(json!({ "timeout_ms": 250, "priority": "high", "topic": "a/b" }))
                .unwrap();
        assert_eq!(options.timeout_ms, Some(250));
        assert_eq!(options.priority(), Priority::High);
        assert_eq!(options.extensions["topic"], json!("a/b"));
    }
}
