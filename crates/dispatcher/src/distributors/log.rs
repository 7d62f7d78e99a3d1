//! LogDistributor - logs event summaries via tracing

use async_trait::async_trait;
use contracts::{Capabilities, ContractError, Distributor, DistributorCore, SendOptions};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use super::config_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Info,
    Warn,
}

/// Distributor that logs every event, for debugging
pub struct LogDistributor {
    core: DistributorCore,
    level: Level,
}

impl LogDistributor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: DistributorCore::new(name, Map::new()),
            level: Level::Info,
        }
    }

    /// Settings: `level` = "debug" | "info" (default) | "warn"
    pub fn from_config(name: impl Into<String>, config: Map<String, Value>) -> Result<Self, ContractError> {
        let level = match config_str(&config, "level")? {
            None | Some("info") => Level::Info,
            Some("debug") => Level::Debug,
            Some("warn") => Level::Warn,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "level",
                    format!("unknown log level '{other}'"),
                ))
            }
        };
        Ok(Self {
            core: DistributorCore::new(name, config),
            level,
        })
    }

    fn log_event(&self, event: &str, data: &Value, options: &SendOptions) {
        let size = data.to_string().len();
        let broadcast = options.is_broadcast();
        let priority = options.priority();
        let name = self.core.name();
        match self.level {
            Level::Debug => {
                debug!(distributor = %name, event, size, broadcast, ?priority, "Event relayed")
            }
            Level::Info => {
                info!(distributor = %name, event, size, broadcast, ?priority, "Event relayed")
            }
            Level::Warn => {
                warn!(distributor = %name, event, size, broadcast, ?priority, "Event relayed")
            }
        }
    }
}

#[async_trait]
impl Distributor for LogDistributor {
    fn core(&self) -> &DistributorCore {
        &self.core
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::send_only().with_broadcast()
    }

    #[instrument(
        name = "log_distributor_send",
        skip(self, data, options),
        fields(distributor = %self.core.name())
    )]
    async fn send(&self, event: &str, data: &Value, options: &SendOptions) -> Result<Value, ContractError> {
        self.log_event(event, data, options);
        self.core.record_sent();
        Ok(json!({ "logged": true }))
    }

    async fn connect(&self) -> Result<(), ContractError> {
        self.core.mark_connected();
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.core.mark_disconnected();
        info!(distributor = %self.core.name(), "LogDistributor closed");
        Ok(())
    }
}
