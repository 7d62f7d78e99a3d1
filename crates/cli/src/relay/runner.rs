//! Relay runner - wires config, coordinator and sessions to an event stream.
//!
//! Input is newline-delimited JSON, one event per line:
//!
//! ```text
//! {"event": "alert", "data": {...}, "targets": ["audit"]}
//! {"event": "reading", "data": {"type": "ping"}, "session": "s1"}
//! ```
//!
//! `targets` selects coordinator distributors explicitly; `session` hands the
//! payload to that session's routing table instead.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, Targets};
use dispatcher::{builtin_factories, DistributionCoordinator};
use serde::Deserialize;
use serde_json::{json, Value};
use session_manager::SessionManager;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::RelayStats;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub blueprint: RelayBlueprint,

    /// Event source (None = stdin)
    pub input: Option<PathBuf>,

    /// Use the routing table for events without explicit targets
    pub use_routes: bool,

    /// Maximum number of events to relay (None = unlimited)
    pub max_events: Option<u64>,

    /// Relay timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Print each response as a JSON line on stdout
    pub print_responses: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// One line of input
#[derive(Debug, Clone, Deserialize)]
struct InputEvent {
    event: String,

    #[serde(default)]
    data: Value,

    #[serde(default)]
    targets: Option<Vec<String>>,

    #[serde(default)]
    session: Option<String>,
}

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Relay until input ends, the event limit or timeout is reached, or
    /// `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<RelayStats>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Distributors + routes
        let factories = builtin_factories();
        let coordinator = DistributionCoordinator::from_blueprint(blueprint, &factories)
            .await
            .context("Failed to build distributors from configuration")?;
        info!(
            distributors = ?coordinator.distributors(),
            routes = coordinator.routes().len(),
            "Coordinator ready"
        );

        // Sessions
        let sessions = SessionManager::new(factories);
        for spec in &blueprint.sessions {
            if let Err(e) = sessions.create_session(&spec.id, spec.config.clone()).await {
                sessions.shutdown().await;
                coordinator.cleanup().await;
                return Err(e).with_context(|| format!("Failed to create session '{}'", spec.id));
            }
        }
        if !blueprint.sessions.is_empty() {
            info!(sessions = ?sessions.active_sessions(), "Sessions ready");
        }

        let reader = self.open_input().await?;

        let mut stats = RelayStats {
            distributors: coordinator.distributors().len(),
            sessions: sessions.active_sessions().len(),
            ..Default::default()
        };

        let relay_loop = self.relay_lines(reader, &coordinator, &sessions, &mut stats);
        let relay_loop = async {
            match self.config.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, relay_loop).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(timeout_secs = timeout.as_secs(), "Relay timed out");
                        Ok(())
                    }
                },
                None => relay_loop.await,
            }
        };

        let result = tokio::select! {
            result = relay_loop => result,
            _ = shutdown => {
                warn!("Received shutdown signal, stopping relay...");
                Ok(())
            }
        };

        // Shutdown
        info!("Shutting down relay...");
        sessions.shutdown().await;
        coordinator.cleanup().await;

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            events_per_sec = format!("{:.2}", stats.events_per_sec()),
            "Relay shutdown complete"
        );

        result.map(|()| stats)
    }

    async fn open_input(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        match &self.config.input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open input {}", path.display()))?;
                info!(path = %path.display(), "Reading events from file");
                Ok(Box::new(BufReader::new(file)))
            }
            None => {
                info!("Reading events from stdin");
                Ok(Box::new(BufReader::new(tokio::io::stdin())))
            }
        }
    }

    async fn relay_lines(
        &self,
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
        coordinator: &DistributionCoordinator,
        sessions: &SessionManager,
        stats: &mut RelayStats,
    ) -> Result<()> {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.lines_read += 1;

            let input: InputEvent = match serde_json::from_str(line) {
                Ok(input) => input,
                Err(e) => {
                    warn!(line = stats.lines_read, error = %e, "Skipping invalid event");
                    stats.parse_errors += 1;
                    continue;
                }
            };

            match &input.session {
                Some(session) => self.relay_session(sessions, session, &input, stats).await,
                None => self.relay_event(coordinator, input, stats).await,
            }

            if let Some(max) = self.config.max_events {
                if stats.events_relayed + stats.session_messages >= max {
                    info!(events = max, "Reached max events limit");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn relay_event(
        &self,
        coordinator: &DistributionCoordinator,
        input: InputEvent,
        stats: &mut RelayStats,
    ) {
        let response = match input.targets {
            Some(targets) => {
                coordinator
                    .distribute(&input.event, &input.data, Targets::named(targets), None)
                    .await
            }
            None if self.config.use_routes => {
                coordinator.route_event(&input.event, &input.data, None).await
            }
            None => {
                coordinator
                    .distribute(&input.event, &input.data, Targets::All, None)
                    .await
            }
        };

        stats.events_relayed += 1;
        stats.delivery.update(&response);
        debug!(
            event = %response.event,
            successful = response.summary.successful,
            failed = response.summary.failed,
            "Event relayed"
        );

        if self.config.print_responses {
            match serde_json::to_string(&response) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Failed to serialize response"),
            }
        }
    }

    async fn relay_session(
        &self,
        sessions: &SessionManager,
        session: &str,
        input: &InputEvent,
        stats: &mut RelayStats,
    ) {
        match sessions.distribute(session, &input.data).await {
            Ok(delivered) => {
                stats.session_messages += 1;
                if !delivered {
                    stats.session_undelivered += 1;
                }
                if self.config.print_responses {
                    println!(
                        "{}",
                        json!({ "event": input.event, "session": session, "delivered": delivered })
                    );
                }
            }
            Err(e) => {
                warn!(session, event = %input.event, error = %e, "Session distribution rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn blueprint(audit_path: &std::path::Path) -> RelayBlueprint {
        serde_json::from_value(json!({
            "coordinator": { "retry_attempts": 1, "retry_delay_ms": 0, "enable_health_check": false },
            "distributors": [
                { "name": "console", "protocol": "log" },
                { "name": "audit", "protocol": "file", "config": { "path": audit_path } }
            ],
            "routes": [{ "event": "alert", "targets": ["audit"] }],
            "sessions": [{
                "id": "s1",
                "distributors": { "log": {} },
                "event_routing": { "ping": ["log_s1"] }
            }]
        }))
        .unwrap()
    }

    fn config(blueprint: RelayBlueprint, input: PathBuf) -> RelayConfig {
        RelayConfig {
            blueprint,
            input: Some(input),
            use_routes: true,
            max_events: None,
            timeout: None,
            print_responses: false,
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn relays_file_input_through_routes_and_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let audit = dir.path().join("audit.jsonl");
        let input = dir.path().join("events.jsonl");

        let mut file = std::fs::File::create(&input).unwrap();
        writeln!(file, r#"{{"event": "alert", "data": {{"level": 3}}}}"#).unwrap();
        writeln!(file, r#"{{"event": "tick", "data": 1, "targets": ["console"]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"event": "ping", "data": {{"type": "ping"}}, "session": "s1"}}"#).unwrap();
        drop(file);

        let stats = Relay::new(config(blueprint(&audit), input))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.events_relayed, 2);
        assert_eq!(stats.session_messages, 1);
        assert_eq!(stats.distributors, 2);
        assert_eq!(stats.sessions, 1);

        let summary = stats.delivery.summary();
        assert_eq!(summary.total_deliveries, 2);
        assert_eq!(summary.failed_deliveries, 0);

        let written = std::fs::read_to_string(&audit).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("\"alert\""));
    }

    #[tokio::test]
    async fn stops_at_max_events() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        let lines: String = (0..5)
            .map(|i| format!("{{\"event\": \"tick\", \"data\": {i}}}\n"))
            .collect();
        std::fs::write(&input, lines).unwrap();

        let mut config = config(blueprint(&dir.path().join("audit.jsonl")), input);
        config.max_events = Some(3);

        let stats = Relay::new(config).run(std::future::pending()).await.unwrap();
        assert_eq!(stats.events_relayed, 3);
    }

    #[tokio::test]
    async fn unknown_protocol_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("events.jsonl");
        std::fs::write(&input, "").unwrap();

        let mut blueprint = blueprint(&dir.path().join("audit.jsonl"));
        blueprint.distributors[0].protocol = "carrier-pigeon".into();

        let err = Relay::new(config(blueprint, input))
            .run(std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to build distributors"));
    }
}
