//! MemoryDistributor - in-process delivery for embedded consumers
//!
//! Keeps a bounded history of relayed messages, fans each one out to a
//! broadcast channel and to callbacks registered through
//! [`Distributor::subscribe`]. Patterns: `*` matches everything, a trailing
//! `*` matches by prefix, anything else matches exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::{
    Capabilities, ContractError, Distributor, DistributorCore, EventCallback, SendOptions,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

use super::config_usize;

const DEFAULT_CAPACITY: usize = 1024;

/// A message as seen by in-process consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedMessage {
    pub sequence: u64,
    pub event: String,
    pub data: Value,
    pub broadcast: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct MemoryDistributor {
    core: DistributorCore,
    capacity: usize,
    sequence: AtomicU64,
    history: Mutex<VecDeque<RelayedMessage>>,
    tx: broadcast::Sender<RelayedMessage>,
    subscriptions: RwLock<HashMap<String, EventCallback>>,
}

impl MemoryDistributor {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, Map::new(), DEFAULT_CAPACITY)
    }

    /// Settings: `capacity` (default 1024) bounds history and channel
    pub fn from_config(name: impl Into<String>, config: Map<String, Value>) -> Result<Self, ContractError> {
        let capacity = config_usize(&config, "capacity", DEFAULT_CAPACITY);
        if capacity == 0 {
            return Err(ContractError::config_validation(
                "capacity",
                "capacity must be >= 1",
            ));
        }
        Ok(Self::with_capacity(name, config, capacity))
    }

    fn with_capacity(name: impl Into<String>, config: Map<String, Value>, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            core: DistributorCore::new(name, config),
            capacity: capacity.max(1),
            sequence: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
            tx,
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Receiver of messages relayed after this call
    pub fn receiver(&self) -> broadcast::Receiver<RelayedMessage> {
        self.tx.subscribe()
    }

    /// Retained messages, oldest first
    pub fn messages(&self) -> Vec<RelayedMessage> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }

    fn relay(&self, event: &str, data: &Value, broadcast: bool) -> Result<Value, ContractError> {
        if self.core.is_stopped() {
            return Err(ContractError::stopped(self.core.name()));
        }

        let message = RelayedMessage {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            event: event.to_string(),
            data: data.clone(),
            broadcast,
            timestamp: Utc::now(),
        };

        {
            let mut history = self.history.lock();
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(message.clone());
        }

        let callbacks: Vec<EventCallback> = self
            .subscriptions
            .read()
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, event))
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in &callbacks {
            callback(event, data);
        }

        let sequence = message.sequence;
        let receivers = self.tx.send(message).unwrap_or(0);
        self.core.record_sent();

        Ok(json!({
            "sequence": sequence,
            "callbacks": callbacks.len(),
            "receivers": receivers,
        }))
    }
}

/// Match an event name against a subscription pattern
pub(crate) fn pattern_matches(pattern: &str, event: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => event.starts_with(prefix),
        None => pattern == event,
    }
}

#[async_trait]
impl Distributor for MemoryDistributor {
    fn core(&self) -> &DistributorCore {
        &self.core
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::send_only().with_broadcast().with_subscribe()
    }

    async fn send(&self, event: &str, data: &Value, options: &SendOptions) -> Result<Value, ContractError> {
        self.relay(event, data, options.is_broadcast())
    }

    async fn broadcast(&self, event: &str, data: &Value, _options: &SendOptions) -> Result<Value, ContractError> {
        self.relay(event, data, true)
    }

    async fn connect(&self) -> Result<(), ContractError> {
        self.core.mark_connected();
        Ok(())
    }

    async fn subscribe(&self, pattern: &str, callback: EventCallback) -> Result<bool, ContractError> {
        self.subscriptions
            .write()
            .insert(pattern.to_string(), callback);
        debug!(distributor = %self.core.name(), pattern, "Subscribed");
        Ok(true)
    }

    async fn unsubscribe(&self, pattern: &str) -> Result<bool, ContractError> {
        Ok(self.subscriptions.write().remove(pattern).is_some())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.subscriptions.write().clear();
        self.core.mark_disconnected();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("alerts.*", "alerts.fire"));
        assert!(!pattern_matches("alerts.*", "metrics.cpu"));
        assert!(pattern_matches("ping", "ping"));
        assert!(!pattern_matches("ping", "pong"));
    }

    #[tokio::test]
    async fn test_subscribers_and_receivers_get_messages() {
        let distributor = MemoryDistributor::new("memory");
        let mut rx = distributor.receiver();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: EventCallback = Arc::new(move |event, _data| {
            sink.lock().push(event.to_string());
        });
        assert!(distributor.subscribe("alerts.*", callback).await.unwrap());

        distributor
            .send("alerts.fire", &json!({ "room": 4 }), &SendOptions::default())
            .await
            .unwrap();
        distributor
            .send("metrics.cpu", &json!(0.4), &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["alerts.fire".to_string()]);
        assert_eq!(rx.recv().await.unwrap().event, "alerts.fire");
        assert_eq!(rx.recv().await.unwrap().sequence, 2);

        assert!(distributor.unsubscribe("alerts.*").await.unwrap());
        assert!(!distributor.unsubscribe("alerts.*").await.unwrap());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let config = Map::from_iter([("capacity".to_string(), json!(2))]);
        let distributor = MemoryDistributor::from_config("memory", config).unwrap();

        for i in 0..3 {
            distributor
                .send("tick", &json!(i), &SendOptions::default())
                .await
                .unwrap();
        }

        let messages = distributor.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].data, json!(1));
        assert_eq!(distributor.stats().messages_sent, 3);
    }
}
