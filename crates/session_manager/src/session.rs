//! Session record

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use contracts::{Distributor, SessionConfig};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic counters of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub messages_distributed: u64,
    pub distribution_errors: u64,
    pub last_distribution_time: Option<DateTime<Utc>>,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    /// Distributor ids that initialized successfully, sorted
    pub active_distributors: Vec<String>,
    pub distributor_count: usize,
    pub event_routing: HashMap<String, Vec<String>>,
    pub stats: SessionStats,
}

/// One session and the distributors it owns
///
/// Only the manager mutates a session; readers get a [`SessionStatus`].
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    distributors: RwLock<BTreeMap<String, Arc<dyn Distributor>>>,
    routing: RwLock<HashMap<String, Vec<String>>>,
    messages_distributed: AtomicU64,
    distribution_errors: AtomicU64,
    last_distribution_time: RwLock<Option<DateTime<Utc>>>,
}

impl Session {
    pub(crate) fn new(id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            config,
            state: RwLock::new(SessionState::Initializing),
            distributors: RwLock::new(BTreeMap::new()),
            routing: RwLock::new(HashMap::new()),
            messages_distributed: AtomicU64::new(0),
            distribution_errors: AtomicU64::new(0),
            last_distribution_time: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Install the initialized distributors and routes, then go active
    ///
    /// Runs under the state lock so it cannot interleave with [`Session::end`].
    /// Hands the distributors back when the session already ended.
    pub(crate) fn activate(
        &self,
        distributors: Vec<(String, Arc<dyn Distributor>)>,
        routing: &HashMap<String, Vec<String>>,
    ) -> Result<(), Vec<(String, Arc<dyn Distributor>)>> {
        let mut state = self.state.write();
        if *state == SessionState::Ended {
            return Err(distributors);
        }
        self.distributors.write().extend(distributors);
        self.routing
            .write()
            .extend(routing.iter().map(|(key, ids)| (key.clone(), ids.clone())));
        *state = SessionState::Active;
        Ok(())
    }

    /// Mark the session ended and hand back its distributors
    ///
    /// `Ended` is terminal; later calls return nothing.
    pub(crate) fn end(&self) -> Vec<(String, Arc<dyn Distributor>)> {
        let mut state = self.state.write();
        *state = SessionState::Ended;
        std::mem::take(&mut *self.distributors.write())
            .into_iter()
            .collect()
    }

    pub fn distributor_ids(&self) -> Vec<String> {
        self.distributors.read().keys().cloned().collect()
    }

    pub fn distributor(&self, id: &str) -> Option<Arc<dyn Distributor>> {
        self.distributors.read().get(id).cloned()
    }

    pub(crate) fn set_route(&self, key: impl Into<String>, ids: Vec<String>) {
        self.routing.write().insert(key.into(), ids);
    }

    /// Distributors for `key`: the routed ids, or every distributor when no
    /// route exists
    pub(crate) fn targets_for(&self, key: &str) -> Vec<(String, Arc<dyn Distributor>)> {
        let routed = self.routing.read().get(key).cloned();
        let distributors = self.distributors.read();

        match routed {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| match distributors.get(&id) {
                    Some(instance) => Some((id, Arc::clone(instance))),
                    None => {
                        warn!(session = %self.id, distributor = %id, "Routed distributor not in session, skipping");
                        None
                    }
                })
                .collect(),
            None => distributors
                .iter()
                .map(|(id, instance)| (id.clone(), Arc::clone(instance)))
                .collect(),
        }
    }

    pub(crate) fn record_error(&self) {
        self.distribution_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one distribute call and its failed targets
    pub(crate) fn record_distribution(&self, errors: u64) {
        self.messages_distributed.fetch_add(1, Ordering::Relaxed);
        self.distribution_errors.fetch_add(errors, Ordering::Relaxed);
        *self.last_distribution_time.write() = Some(Utc::now());
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            messages_distributed: self.messages_distributed.load(Ordering::Relaxed),
            distribution_errors: self.distribution_errors.load(Ordering::Relaxed),
            last_distribution_time: *self.last_distribution_time.read(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let active_distributors = self.distributor_ids();
        SessionStatus {
            id: self.id.clone(),
            state: self.state(),
            created_at: self.created_at,
            distributor_count: active_distributors.len(),
            active_distributors,
            event_routing: self.routing.read().clone(),
            stats: self.stats(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("distributors", &self.distributor_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_is_terminal() {
        let session = Session::new("s1", SessionConfig::default());
        assert_eq!(session.state(), SessionState::Initializing);

        let routing = HashMap::from([("ping".to_string(), vec!["http_s1".to_string()])]);
        assert!(session.activate(Vec::new(), &routing).is_ok());
        assert!(session.is_active());
        assert_eq!(session.status().event_routing, routing);

        assert!(session.end().is_empty());
        assert!(session.activate(Vec::new(), &HashMap::new()).is_err());
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.status().distributor_count, 0);
    }

    #[test]
    fn stats_track_calls_and_errors() {
        let session = Session::new("s1", SessionConfig::default());
        session.record_distribution(2);
        session.record_distribution(0);
        session.record_error();

        let stats = session.stats();
        assert_eq!(stats.messages_distributed, 2);
        assert_eq!(stats.distribution_errors, 3);
        assert!(stats.last_distribution_time.is_some());
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionState::Initializing).unwrap(),
            "\"initializing\""
        );
        assert_eq!(SessionState::Ended.to_string(), "ended");
    }
}
