//! UdpDistributor - UDP fire-and-forget streaming

use async_trait::async_trait;
use chrono::Utc;
use contracts::{Capabilities, ContractError, Distributor, DistributorCore, SendOptions};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

use super::{config_str, config_usize, with_timeout};

/// Wire format of a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UdpFormat {
    /// `{"event", "timestamp", "data"}` as JSON
    #[default]
    Json,
    /// bincode of (event, timestamp_ms, data as JSON text)
    Bincode,
}

#[derive(Serialize)]
struct JsonEnvelope<'a> {
    event: &'a str,
    timestamp: i64,
    data: &'a Value,
}

#[derive(Serialize)]
struct BinaryEnvelope<'a> {
    event: &'a str,
    timestamp: i64,
    data: String,
}

/// Settings of a UdpDistributor
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub addr: SocketAddr,
    pub format: UdpFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpConfig {
    /// Settings: `addr` (required), `format` = "json" | "bincode",
    /// `max_packet_size` (default 65000)
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ContractError> {
        let addr_str = config_str(config, "addr")?
            .ok_or_else(|| ContractError::config_validation("addr", "missing 'addr' setting"))?;

        let addr: SocketAddr = addr_str.parse().map_err(|e| {
            ContractError::config_validation("addr", format!("invalid address '{addr_str}': {e}"))
        })?;

        let format = match config_str(config, "format")? {
            Some("bincode") => UdpFormat::Bincode,
            Some("json") | None => UdpFormat::Json,
            Some(other) => {
                return Err(ContractError::config_validation(
                    "format",
                    format!("unknown format '{other}'"),
                ))
            }
        };

        Ok(Self {
            addr,
            format,
            max_packet_size: config_usize(config, "max_packet_size", 65000),
        })
    }
}

/// Distributor that sends each event as one UDP datagram
pub struct UdpDistributor {
    core: DistributorCore,
    config: UdpConfig,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl UdpDistributor {
    pub fn new(name: impl Into<String>, config: UdpConfig) -> Self {
        let mut settings = Map::new();
        settings.insert("addr".to_string(), json!(config.addr.to_string()));
        Self {
            core: DistributorCore::new(name, settings),
            config,
            socket: Mutex::new(None),
        }
    }

    pub fn from_config(name: impl Into<String>, config: Map<String, Value>) -> Result<Self, ContractError> {
        let udp = UdpConfig::from_config(&config)?;
        Ok(Self {
            core: DistributorCore::new(name, config),
            config: udp,
            socket: Mutex::new(None),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.config.addr
    }

    fn encode(&self, event: &str, data: &Value) -> Result<Vec<u8>, ContractError> {
        let timestamp = Utc::now().timestamp_millis();
        let bytes = match self.config.format {
            UdpFormat::Json => serde_json::to_vec(&JsonEnvelope {
                event,
                timestamp,
                data,
            })
            .map_err(|e| ContractError::serialization(format!("json error: {e}")))?,
            UdpFormat::Bincode => bincode::serialize(&BinaryEnvelope {
                event,
                timestamp,
                data: data.to_string(),
            })
            .map_err(|e| ContractError::serialization(format!("bincode error: {e}")))?,
        };

        if bytes.len() > self.config.max_packet_size {
            return Err(ContractError::transport(format!(
                "payload of {} bytes exceeds max packet size {}",
                bytes.len(),
                self.config.max_packet_size
            )));
        }
        Ok(bytes)
    }

    /// Bound socket, connecting on first use
    async fn socket(&self) -> Result<Arc<UdpSocket>, ContractError> {
        let existing = self.socket.lock().clone();
        if let Some(socket) = existing {
            return Ok(socket);
        }
        if self.core.is_stopped() {
            return Err(ContractError::stopped(self.core.name()));
        }

        let bind_addr = if self.config.addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ContractError::connection(self.core.name(), e.to_string()))?;
        socket
            .connect(self.config.addr)
            .await
            .map_err(|e| ContractError::connection(self.core.name(), e.to_string()))?;

        let socket = Arc::new(socket);
        *self.socket.lock() = Some(Arc::clone(&socket));
        self.core.mark_connected();
        debug!(distributor = %self.core.name(), target = %self.config.addr, "UDP socket connected");
        Ok(socket)
    }
}

#[async_trait]
impl Distributor for UdpDistributor {
    fn core(&self) -> &DistributorCore {
        &self.core
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::send_only()
    }

    #[instrument(
        name = "udp_distributor_send",
        skip(self, data, options),
        fields(distributor = %self.core.name())
    )]
    async fn send(&self, event: &str, data: &Value, options: &SendOptions) -> Result<Value, ContractError> {
        let bytes = self.encode(event, data)?;

        let sent = with_timeout(self.core.name(), options, async {
            let socket = self.socket().await?;
            socket
                .send(&bytes)
                .await
                .map_err(|e| ContractError::transport(format!("UDP send failed: {e}")))
        })
        .await;

        match sent {
            Ok(sent) => {
                self.core.record_sent();
                debug!(distributor = %self.core.name(), event, bytes = sent, "Sent");
                Ok(json!({ "bytes": sent }))
            }
            Err(e) => {
                self.core.record_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn connect(&self) -> Result<(), ContractError> {
        match self.socket().await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.core.mark_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.socket.lock().take();
        self.core.mark_disconnected();
        debug!(distributor = %self.core.name(), "UdpDistributor closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn config(addr: SocketAddr, format: &str) -> Map<String, Value> {
        Map::from_iter([
            ("addr".to_string(), json!(addr.to_string())),
            ("format".to_string(), json!(format)),
        ])
    }

    #[test]
    fn test_udp_config_parsing() {
        let config = UdpConfig::from_config(&config("127.0.0.1:9999".parse().unwrap(), "json")).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, UdpFormat::Json);

        let bad = Map::from_iter([("addr".to_string(), json!("not-an-addr"))]);
        assert!(UdpConfig::from_config(&bad).is_err());
    }

    #[tokio::test]
    async fn test_udp_json_datagram() {
        let (rx, addr) = receiver().await;
        let distributor = UdpDistributor::from_config("udp", config(addr, "json")).unwrap();
        distributor.connect().await.unwrap();

        distributor
            .send("reading", &json!({ "temp": 21.5 }), &SendOptions::default())
            .await
            .unwrap();

        let mut buf = vec![0u8; 2048];
        let n = rx.recv(&mut buf).await.unwrap();
        let packet: Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(packet["event"], "reading");
        assert_eq!(packet["data"]["temp"], json!(21.5));
        assert_eq!(distributor.stats().messages_sent, 1);
    }

    #[tokio::test]
    async fn test_udp_bincode_datagram() {
        let (rx, addr) = receiver().await;
        let distributor = UdpDistributor::from_config("udp", config(addr, "bincode")).unwrap();

        // connects lazily on first send
        distributor
            .send("reading", &json!([1, 2, 3]), &SendOptions::default())
            .await
            .unwrap();

        let mut buf = vec![0u8; 2048];
        let n = rx.recv(&mut buf).await.unwrap();
        let (event, _timestamp, data): (String, i64, String) =
            bincode::deserialize(&buf[..n]).unwrap();
        assert_eq!(event, "reading");
        assert_eq!(data, "[1,2,3]");
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let (_rx, addr) = receiver().await;
        let mut settings = config(addr, "json");
        settings.insert("max_packet_size".to_string(), json!(16));
        let distributor = UdpDistributor::from_config("udp", settings).unwrap();

        let err = distributor
            .send("reading", &json!({ "blob": "x".repeat(64) }), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds max packet size"));
    }

    #[tokio::test]
    async fn test_no_send_after_cleanup() {
        let (_rx, addr) = receiver().await;
        let distributor = UdpDistributor::from_config("udp", config(addr, "json")).unwrap();
        distributor.connect().await.unwrap();
        distributor.cleanup().await.unwrap();

        let err = distributor
            .send("reading", &json!({}), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Stopped { .. }));
    }
}
