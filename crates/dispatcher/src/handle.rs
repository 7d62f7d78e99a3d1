//! DistributorHandle - a registered distributor and its enable flag

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use contracts::{Distributor, ENABLED_KEY};

/// Registry entry of the coordinator
///
/// The instance's `enabled` config is the only enable flag; the handle
/// toggles it through `update_config`.
pub struct DistributorHandle {
    name: String,
    instance: Arc<dyn Distributor>,
    registered_at: DateTime<Utc>,
}

impl DistributorHandle {
    pub fn new(name: impl Into<String>, instance: Arc<dyn Distributor>) -> Self {
        Self {
            name: name.into(),
            instance,
            registered_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &Arc<dyn Distributor> {
        &self.instance
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Eligible for dispatch
    pub fn is_active(&self) -> bool {
        self.instance.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut partial = Map::new();
        partial.insert(ENABLED_KEY.to_string(), Value::Bool(enabled));
        self.instance.update_config(partial);
    }

    pub fn supports_broadcast(&self) -> bool {
        self.instance.capabilities().broadcast
    }
}

impl std::fmt::Debug for DistributorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributorHandle")
            .field("name", &self.name)
            .field("enabled", &self.is_active())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}
