//! Coordinator notification channel
//!
//! [`EventBus`] wraps [`tokio::sync::broadcast`]. Publishing never blocks and
//! events are dropped when nobody is subscribed; slow receivers observe
//! `RecvError::Lagged`.

use serde::Serialize;
use tokio::sync::broadcast;

use contracts::{CoordinatorConfig, DistributionSummary, HealthReport};

/// Notifications published by the coordinator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    DistributorRegistered { name: String },
    DistributorUnregistered { name: String },
    DistributorConnected { name: String },
    DistributorError { name: String, error: String },
    DistributionCompleted { event: String, summary: DistributionSummary },
    RouteConfigured { event: String, targets: Vec<String> },
    HealthChecked { report: HealthReport },
    HealthWarning { unhealthy: Vec<String> },
    ConfigUpdated { config: CoordinatorConfig },
    CoordinatorCleanedUp,
}

impl RelayEvent {
    /// Wire name of the notification
    pub fn name(&self) -> &'static str {
        match self {
            Self::DistributorRegistered { .. } => "distributor:registered",
            Self::DistributorUnregistered { .. } => "distributor:unregistered",
            Self::DistributorConnected { .. } => "distributor:connected",
            Self::DistributorError { .. } => "distributor:error",
            Self::DistributionCompleted { .. } => "distribution:completed",
            Self::RouteConfigured { .. } => "routing:configured",
            Self::HealthChecked { .. } => "health:check",
            Self::HealthWarning { .. } => "health:warning",
            Self::ConfigUpdated { .. } => "config:updated",
            Self::CoordinatorCleanedUp => "coordinator:cleanup",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    /// Capacity is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    /// Receiver for events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(RelayEvent::DistributorRegistered {
            name: "udp".into(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "distributor:registered");
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(0);
        bus.publish(RelayEvent::CoordinatorCleanedUp);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(RelayEvent::HealthWarning {
            unhealthy: vec!["mqtt".into()],
        })
        .unwrap();
        assert_eq!(json["type"], "health_warning");
        assert_eq!(json["unhealthy"][0], "mqtt");
    }
}
