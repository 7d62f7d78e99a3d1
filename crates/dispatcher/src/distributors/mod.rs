//! Built-in distributors
//!
//! - `log`: tracing output, for debugging pipelines
//! - `udp`: fire-and-forget datagrams (JSON or bincode)
//! - `file`: JSON-lines append log
//! - `memory`: in-process channel with pattern subscriptions
//!
//! Transports living outside this crate plug in through their own
//! [`DistributorFactory`](contracts::DistributorFactory).

mod file;
mod log;
mod memory;
mod udp;

pub use self::file::FileDistributor;
pub use self::log::LogDistributor;
pub use self::memory::{MemoryDistributor, RelayedMessage};
pub use self::udp::{UdpDistributor, UdpFormat};

use contracts::{ContractError, Distributor, FactoryRegistry, SendOptions};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Registry with every built-in protocol registered
pub fn builtin_factories() -> FactoryRegistry {
    let mut registry = FactoryRegistry::new();
    registry.register_fn("log", |name, config| async move {
        Ok(Arc::new(LogDistributor::from_config(name, config)?) as Arc<dyn Distributor>)
    });
    registry.register_fn("udp", |name, config| async move {
        Ok(Arc::new(UdpDistributor::from_config(name, config)?) as Arc<dyn Distributor>)
    });
    registry.register_fn("file", |name, config| async move {
        Ok(Arc::new(FileDistributor::from_config(name, config)?) as Arc<dyn Distributor>)
    });
    registry.register_fn("memory", |name, config| async move {
        Ok(Arc::new(MemoryDistributor::from_config(name, config)?) as Arc<dyn Distributor>)
    });
    registry
}

/// Apply the per-send timeout, if any
pub(crate) async fn with_timeout<T, F>(
    name: &str,
    options: &SendOptions,
    fut: F,
) -> Result<T, ContractError>
where
    F: Future<Output = Result<T, ContractError>>,
{
    match options.timeout() {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ContractError::Timeout {
                distributor: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?,
        None => fut.await,
    }
}

/// Read an optional string setting
pub(crate) fn config_str<'a>(
    config: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ContractError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ContractError::config_validation(
            key,
            format!("expected a string, got {other}"),
        )),
    }
}

pub(crate) fn config_bool(config: &Map<String, Value>, key: &str, default: bool) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn config_usize(config: &Map<String, Value>, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}
