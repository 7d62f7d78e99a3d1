//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Config loading feeding the coordinator
//! - Blueprint -> coordinator -> built-in distributors
//! - Session lifecycle over built-in distributors
//! - UDP delivery over loopback

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_blueprint_survives_toml_round_trip() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[coordinator]
retry_attempts = 2

[[distributors]]
name = "bus"
protocol = "memory"

[[routes]]
event = "alert"
targets = ["bus"]
[routes.options]
priority = "high"
timeout_ms = 500

[[sessions]]
id = "s1"
[sessions.distributors.log]
level = "debug"
[sessions.event_routing]
ping = ["log_s1"]
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(
            blueprint.routes[0].options.send.priority(),
            contracts::Priority::High
        );

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        assert_eq!(reloaded.coordinator, blueprint.coordinator);
        assert_eq!(reloaded.routes[0].options, blueprint.routes[0].options);
        assert_eq!(reloaded.sessions[0].config, blueprint.sessions[0].config);
    }

    #[test]
    fn test_route_to_unknown_distributor_rejected() {
        let err = ConfigLoader::load_from_str(
            r#"{"routes": [{"event": "alert", "targets": ["ghost"]}]}"#,
            ConfigFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Distributor, EventCallback, SessionConfig, Targets};
    use dispatcher::{builtin_factories, DistributionCoordinator, MemoryDistributor, RelayEvent};
    use serde_json::{json, Map, Value};
    use session_manager::{SessionManager, SessionState};
    use tokio::net::UdpSocket;

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn counting_callback() -> (EventCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: EventCallback = Arc::new(move |_event: &str, _data: &Value| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    /// End-to-end test: config text -> coordinator -> file / memory distributors
    ///
    /// Verifies:
    /// 1. Routes select their targets and isolate a failing one
    /// 2. `all` reaches every enabled distributor
    /// 3. Broadcast only reaches broadcast-capable distributors
    #[tokio::test]
    async fn test_e2e_blueprint_relay() {
        let dir = tempfile::tempdir().unwrap();
        let audit = dir.path().join("audit.jsonl");
        // a directory cannot be opened for append
        let broken = dir.path().to_path_buf();

        let config = json!({
            "coordinator": { "retry_attempts": 2, "retry_delay_ms": 10, "enable_health_check": false },
            "distributors": [
                { "name": "audit", "protocol": "file", "config": { "path": audit } },
                { "name": "broken", "protocol": "file", "config": { "path": broken } },
                { "name": "bus", "protocol": "memory" }
            ],
            "routes": [{ "event": "alert", "targets": ["audit", "broken"] }]
        });
        let blueprint =
            ConfigLoader::load_from_str(&config.to_string(), ConfigFormat::Json).unwrap();

        let coordinator = DistributionCoordinator::from_blueprint(&blueprint, &builtin_factories())
            .await
            .unwrap();
        let (callback, alerts) = counting_callback();
        let bus = coordinator.distributor("bus").unwrap();
        assert!(bus.subscribe("alert*", callback).await.unwrap());

        // 1. routed
        let response = coordinator
            .route_event("alert", &json!({ "level": 3 }), None)
            .await;
        assert_eq!(response.summary.total, 2);
        assert_eq!(response.summary.successful, 1);
        assert_eq!(response.summary.failed, 1);
        assert_eq!(response.result_for("broken").unwrap().attempts, 2);
        assert_eq!(alerts.load(Ordering::SeqCst), 0);

        // 2. all
        let response = coordinator
            .distribute("alert.low", &json!({}), Targets::All, None)
            .await;
        assert_eq!(response.summary.total, 3);
        assert_eq!(response.summary.failed, 1);
        assert_eq!(alerts.load(Ordering::SeqCst), 1);

        // 3. broadcast
        let response = coordinator.broadcast("alert.all", &json!({}), None).await;
        assert_eq!(response.summary.total, 1);
        assert_eq!(response.results[0].distributor, "bus");
        assert_eq!(alerts.load(Ordering::SeqCst), 2);

        let written = std::fs::read_to_string(&audit).unwrap();
        let events: Vec<String> = written
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["event"].to_string())
            .collect();
        assert_eq!(events, vec!["\"alert\"", "\"alert.low\""]);

        let stats = coordinator.stats();
        assert_eq!(stats.performance.total_messages, 6);
        assert_eq!(stats.performance.total_errors, 2);

        coordinator.cleanup().await;
        assert!(coordinator.distributors().is_empty());
        assert!(!bus.is_healthy().await);
    }

    /// End-to-end test: typed memory distributor observed through its receiver
    #[tokio::test]
    async fn test_e2e_memory_receiver_and_toggle() {
        let coordinator = DistributionCoordinator::new(contracts::CoordinatorConfig {
            enable_health_check: false,
            ..Default::default()
        });
        let mut events = coordinator.subscribe();

        let memory = Arc::new(MemoryDistributor::new("memory"));
        let mut rx = memory.receiver();
        coordinator
            .register_distributor("memory", Arc::clone(&memory) as Arc<dyn Distributor>)
            .unwrap();

        for i in 0..3 {
            coordinator
                .distribute("tick", &json!({ "i": i }), "memory", None)
                .await;
        }
        for expected in 1..=3 {
            let message = rx.recv().await.unwrap();
            assert_eq!(message.sequence, expected);
            assert_eq!(message.data["i"], json!(expected - 1));
        }

        assert!(coordinator.set_distributor_enabled("memory", false));
        let response = coordinator
            .distribute("tick", &json!({}), Targets::All, None)
            .await;
        assert_eq!(response.summary.total, 0);
        assert_eq!(memory.messages().len(), 3);

        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RelayEvent::DistributionCompleted { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 4);
    }

    /// End-to-end test: session scoped distributors built from the factories
    #[tokio::test]
    async fn test_e2e_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");

        let manager = SessionManager::new(builtin_factories());
        let config = SessionConfig::default()
            .with_distributor("memory", Map::new())
            .with_distributor("file", settings(json!({ "path": path })))
            .with_distributor("mqtt", Map::new())
            .with_route("ping", ["memory_s1"])
            .with_route("gps", ["file_s1"]);

        let status = manager.create_session("s1", config).await.unwrap();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.active_distributors, vec!["file_s1", "memory_s1"]);

        let session = manager.session("s1").unwrap();
        let (callback, seen) = counting_callback();
        session
            .distributor("memory_s1")
            .unwrap()
            .subscribe("*", callback)
            .await
            .unwrap();

        assert!(manager.distribute("s1", &json!({ "type": "ping" })).await.unwrap());
        assert!(manager
            .distribute("s1", &json!({ "source": "gps", "lat": 1.5 }))
            .await
            .unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let stats = manager.session_status("s1").unwrap().stats;
        assert_eq!(stats.messages_distributed, 2);
        assert_eq!(stats.distribution_errors, 0);

        manager.end_session("s1").await.unwrap();
        assert!(manager.session_status("s1").is_none());

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("\"gps\""));
    }

    /// End-to-end test: JSON datagrams over loopback
    #[tokio::test]
    async fn test_e2e_udp_delivery() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let config = json!({
            "coordinator": { "retry_attempts": 1, "enable_health_check": false },
            "distributors": [
                { "name": "udp", "protocol": "udp", "config": { "addr": addr.to_string() } }
            ]
        });
        let blueprint =
            ConfigLoader::load_from_str(&config.to_string(), ConfigFormat::Json).unwrap();
        let coordinator = DistributionCoordinator::from_blueprint(&blueprint, &builtin_factories())
            .await
            .unwrap();

        let response = coordinator
            .distribute("reading", &json!({ "temp": 21.5 }), "udp", None)
            .await;
        assert!(response.all_succeeded());

        let mut buf = vec![0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let envelope: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(envelope["event"], json!("reading"));
        assert_eq!(envelope["data"]["temp"], json!(21.5));

        coordinator.cleanup().await;
    }
}
