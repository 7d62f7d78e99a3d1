//! FileDistributor - appends events to a JSON-lines file

use async_trait::async_trait;
use chrono::Utc;
use contracts::{Capabilities, ContractError, Distributor, DistributorCore, SendOptions};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use super::{config_bool, config_str, with_timeout};

/// Distributor that appends one JSON object per event
///
/// Line shape: `{"event", "timestamp", "broadcast", "data"}`.
pub struct FileDistributor {
    core: DistributorCore,
    path: PathBuf,
    broadcast: bool,
    file: Mutex<Option<File>>,
}

impl FileDistributor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut config = Map::new();
        config.insert("path".to_string(), json!(path.display().to_string()));
        Self {
            core: DistributorCore::new(name, config),
            path,
            broadcast: false,
            file: Mutex::new(None),
        }
    }

    /// Settings: `path` (required), `broadcast` (default false) declares the
    /// broadcast capability
    pub fn from_config(name: impl Into<String>, config: Map<String, Value>) -> Result<Self, ContractError> {
        let path = config_str(&config, "path")?
            .map(PathBuf::from)
            .ok_or_else(|| ContractError::config_validation("path", "missing 'path' setting"))?;
        let broadcast = config_bool(&config, "broadcast", false);

        Ok(Self {
            core: DistributorCore::new(name, config),
            path,
            broadcast,
            file: Mutex::new(None),
        })
    }

    pub fn with_broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File, ContractError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }

    async fn append(&self, line: &[u8]) -> Result<(), ContractError> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if self.core.is_stopped() {
                return Err(ContractError::stopped(self.core.name()));
            }
            *guard = Some(self.open().await?);
            self.core.mark_connected();
        }

        if let Some(file) = guard.as_mut() {
            file.write_all(line).await?;
            file.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Distributor for FileDistributor {
    fn core(&self) -> &DistributorCore {
        &self.core
    }

    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::send_only();
        if self.broadcast {
            caps.with_broadcast()
        } else {
            caps
        }
    }

    #[instrument(
        name = "file_distributor_send",
        skip(self, data, options),
        fields(distributor = %self.core.name())
    )]
    async fn send(&self, event: &str, data: &Value, options: &SendOptions) -> Result<Value, ContractError> {
        let record = json!({
            "event": event,
            "timestamp": Utc::now(),
            "broadcast": options.is_broadcast(),
            "data": data,
        });
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| ContractError::serialization(e.to_string()))?;
        line.push(b'\n');

        match with_timeout(self.core.name(), options, self.append(&line)).await {
            Ok(()) => {
                self.core.record_sent();
                Ok(json!({ "bytes": line.len() }))
            }
            Err(e) => {
                error!(distributor = %self.core.name(), error = %e, "Append failed");
                self.core.record_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn connect(&self) -> Result<(), ContractError> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            match self.open().await {
                Ok(file) => *guard = Some(file),
                Err(e) => {
                    self.core.mark_error(e.to_string());
                    return Err(e);
                }
            }
        }
        self.core.mark_connected();
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
        }
        self.core.mark_disconnected();
        debug!(distributor = %self.core.name(), path = %self.path.display(), "FileDistributor closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_distributor_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let distributor = FileDistributor::new("audit", &path);
        distributor.connect().await.unwrap();

        distributor
            .send("alert", &json!({ "id": 1 }), &SendOptions::default())
            .await
            .unwrap();
        distributor
            .broadcast("alert", &json!({ "id": 2 }), &SendOptions::default())
            .await
            .unwrap();
        distributor.cleanup().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["data"]["id"], json!(1));
        assert_eq!(lines[1]["broadcast"], json!(true));
    }

    #[test]
    fn test_broadcast_capability_from_config() {
        let config = Map::from_iter([
            ("path".to_string(), json!("events.jsonl")),
            ("broadcast".to_string(), json!(true)),
        ]);
        let distributor = FileDistributor::from_config("audit", config).unwrap();
        assert!(distributor.capabilities().broadcast);

        assert!(FileDistributor::from_config("audit", Map::new()).is_err());
    }
}
