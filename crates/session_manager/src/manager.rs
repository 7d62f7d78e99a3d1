//! SessionManager - session lifecycle and health-gated dispatch

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    session_distributor_id, ContractError, Distributor, FactoryRegistry, SendOptions,
    SessionConfig,
};

use crate::error::SessionError;
use crate::session::{Session, SessionState, SessionStatus};

/// Routing key used when the payload carries neither `type` nor `source`
pub const DEFAULT_ROUTING_KEY: &str = "default";

/// Routing key of a session payload: `data.type`, then `data.source`, then
/// `"default"`
pub fn routing_key(data: &Value) -> &str {
    ["type", "source"]
        .iter()
        .find_map(|field| data.get(field).and_then(Value::as_str))
        .unwrap_or(DEFAULT_ROUTING_KEY)
}

/// Outcome of one target in a session dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOutcome {
    Delivered,
    Failed,
    /// Health gate closed
    Skipped,
}

/// Owns every live session
///
/// Ended sessions are removed, so an id can be reused once `end_session`
/// returns.
pub struct SessionManager {
    factories: FactoryRegistry,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(factories: FactoryRegistry) -> Self {
        Self {
            factories,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Create a session and initialize its distributors
    ///
    /// Every protocol in `config.distributors` with a registered factory is
    /// built and initialized concurrently under `{protocol}_{id}`. Unknown
    /// protocols are skipped; a distributor that fails to build or
    /// initialize is left out and counted as a session error.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyExists`] when `id` is live
    #[instrument(name = "session_create", skip_all, fields(session = %id))]
    pub async fn create_session(
        &self,
        id: &str,
        config: SessionConfig,
    ) -> Result<SessionStatus, SessionError> {
        let session = Arc::new(Session::new(id, config.clone()));
        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(id) {
                return Err(SessionError::AlreadyExists { id: id.to_string() });
            }
            sessions.insert(id.to_string(), Arc::clone(&session));
        }

        let builds = config
            .distributors
            .iter()
            .filter_map(|(protocol, protocol_config)| {
                if !self.factories.contains(protocol) {
                    warn!(session = %id, protocol = %protocol, "No factory for protocol, skipping");
                    return None;
                }
                let distributor_id = session_distributor_id(protocol, id);
                Some(async move {
                    let result = self
                        .build(protocol, &distributor_id, protocol_config.clone())
                        .await;
                    (distributor_id, result)
                })
            });

        let mut ready = Vec::new();
        for (distributor_id, result) in join_all(builds).await {
            match result {
                Ok(instance) => {
                    debug!(session = %id, distributor = %distributor_id, "Distributor initialized");
                    ready.push((distributor_id, instance));
                }
                Err(e) => {
                    error!(session = %id, distributor = %distributor_id, error = %e, "Distributor initialization failed");
                    session.record_error();
                }
            }
        }

        // ended while initializing
        if let Err(orphaned) = session.activate(ready, &config.event_routing) {
            cleanup_all(id, &orphaned).await;
            return Err(SessionError::NotActive {
                id: id.to_string(),
                state: SessionState::Ended,
            });
        }

        observability::metrics::set_active_sessions(self.active_sessions().len());
        info!(
            session = %id,
            distributors = ?session.distributor_ids(),
            routes = config.event_routing.len(),
            "Session created"
        );
        Ok(session.status())
    }

    async fn build(
        &self,
        protocol: &str,
        distributor_id: &str,
        config: Map<String, Value>,
    ) -> Result<Arc<dyn Distributor>, ContractError> {
        let instance = self.factories.create(protocol, distributor_id, config).await?;
        if let Err(e) = instance.initialize().await {
            if let Err(cleanup) = instance.cleanup().await {
                debug!(distributor = %distributor_id, error = %cleanup, "Cleanup after failed initialize");
            }
            return Err(e);
        }
        Ok(instance)
    }

    /// Dispatch one payload through the session's routing table
    ///
    /// The event name sent to each distributor is the routing key. Targets
    /// whose `is_healthy()` is false are skipped. Returns true when at least
    /// one target accepted the payload; transport failures are counted, not
    /// returned.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown id
    /// - [`SessionError::NotActive`] while the session is not active
    #[instrument(name = "session_distribute", skip_all, fields(session = %id))]
    pub async fn distribute(&self, id: &str, data: &Value) -> Result<bool, SessionError> {
        let session = self.session(id).ok_or_else(|| SessionError::not_found(id))?;
        let state = session.state();
        if state != SessionState::Active {
            return Err(SessionError::NotActive {
                id: id.to_string(),
                state,
            });
        }

        let key = routing_key(data);
        let targets = session.targets_for(key);
        if targets.is_empty() {
            warn!(session = %id, key, "No distributors for routing key");
        }

        let options = SendOptions::default();
        let sends = targets.iter().map(|(distributor_id, instance)| {
            let options = &options;
            async move {
                if !instance.is_healthy().await {
                    warn!(session = %id, distributor = %distributor_id, "Distributor unhealthy, skipping");
                    return TargetOutcome::Skipped;
                }
                match instance.send(key, data, options).await {
                    Ok(_) => TargetOutcome::Delivered,
                    Err(e) => {
                        error!(session = %id, distributor = %distributor_id, error = %e, "Session distribution failed");
                        TargetOutcome::Failed
                    }
                }
            }
        });
        let outcomes = join_all(sends).await;

        let delivered = outcomes
            .iter()
            .filter(|o| **o == TargetOutcome::Delivered)
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| **o == TargetOutcome::Failed)
            .count();

        session.record_distribution(failed as u64);
        observability::metrics::record_session_distribution(delivered > 0);
        debug!(session = %id, key, delivered, failed, "Session distribution completed");

        Ok(delivered > 0)
    }

    /// Mark `id` ended, clean up every distributor and forget it
    ///
    /// Cleanup failures are logged, never returned.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown id
    #[instrument(name = "session_end", skip_all, fields(session = %id))]
    pub async fn end_session(&self, id: &str) -> Result<(), SessionError> {
        let session = self.session(id).ok_or_else(|| SessionError::not_found(id))?;

        let distributors = session.end();
        cleanup_all(id, &distributors).await;
        self.sessions.write().remove(id);

        observability::metrics::set_active_sessions(self.active_sessions().len());
        info!(session = %id, distributors = distributors.len(), stats = ?session.stats(), "Session ended");
        Ok(())
    }

    /// Replace the routed ids for `key`
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown id
    pub fn set_session_routing(
        &self,
        id: &str,
        key: impl Into<String>,
        ids: Vec<String>,
    ) -> Result<(), SessionError> {
        let session = self.session(id).ok_or_else(|| SessionError::not_found(id))?;
        let key = key.into();
        debug!(session = %id, key = %key, targets = ?ids, "Session route configured");
        session.set_route(key, ids);
        Ok(())
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn session_status(&self, id: &str) -> Option<SessionStatus> {
        self.session(id).map(|session| session.status())
    }

    /// Ids of active sessions, sorted
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .values()
            .filter(|session| session.is_active())
            .map(|session| session.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Status of every live session, sorted by id
    pub fn all_sessions(&self) -> Vec<SessionStatus> {
        let mut all: Vec<SessionStatus> = self
            .sessions
            .read()
            .values()
            .map(|session| session.status())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// End every live session
    ///
    /// Returns the number of sessions ended.
    #[instrument(name = "session_shutdown", skip(self))]
    pub async fn shutdown(&self) -> usize {
        let ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        let ends = ids.iter().map(|id| self.end_session(id));
        let ended = join_all(ends).await.into_iter().filter(Result::is_ok).count();
        info!(sessions = ended, "Session manager shut down");
        ended
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("factories", &self.factories)
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

async fn cleanup_all(session: &str, distributors: &[(String, Arc<dyn Distributor>)]) {
    let cleanups = distributors.iter().map(|(distributor_id, instance)| async move {
        if let Err(e) = instance.cleanup().await {
            error!(session, distributor = %distributor_id, error = %e, "Cleanup failed");
        }
    });
    join_all(cleanups).await;
}
