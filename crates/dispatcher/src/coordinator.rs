//! DistributionCoordinator - registry, routing and concurrent fan-out
//!
//! One coordinator owns a set of named distributors and an event routing
//! table. `distribute` sends to every selected target concurrently, each
//! target isolated behind its own retry loop, and always answers with a
//! [`DistributionResponse`]: transport failures become per-target error
//! results, never an `Err`.
//!
//! Health polling here is advisory only: an unhealthy distributor is
//! reported and logged but stays eligible for dispatch. The session manager
//! gates dispatch on health instead.

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    CoordinatorConfig, CoordinatorConfigPatch, DistributionOptions, DistributionResponse,
    DistributionResult, Distributor, DistributorStats, FactoryRegistry, HealthReport,
    RelayBlueprint, SendOptions, Targets, ALL_TARGETS,
};

use crate::error::DistributionError;
use crate::events::{EventBus, RelayEvent};
use crate::handle::DistributorHandle;
use crate::health::{collect_report, spawn_poller};
use crate::metrics::{CoordinatorMetrics, PerformanceStats};
use crate::retry::RetryPolicy;
use crate::routing::{EventRoute, RoutingTable};

/// Snapshot returned by [`DistributionCoordinator::stats`]
#[derive(Debug, Clone, Serialize)]
pub struct DistributionStats {
    pub distributor_count: usize,
    pub distributors: Vec<String>,
    pub routing_rules: usize,
    pub performance: PerformanceStats,
}

/// How a target is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendMode {
    Send,
    Broadcast,
}

struct Inner {
    config: RwLock<CoordinatorConfig>,
    distributors: RwLock<BTreeMap<String, Arc<DistributorHandle>>>,
    routes: RwLock<RoutingTable>,
    metrics: CoordinatorMetrics,
    events: EventBus,
    health_task: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.health_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Central distribution coordinator
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct DistributionCoordinator {
    inner: Arc<Inner>,
}

impl DistributionCoordinator {
    /// Create a coordinator without starting health polling
    pub fn new(config: CoordinatorConfig) -> Self {
        let events = EventBus::new(config.event_channel_capacity);
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                distributors: RwLock::new(BTreeMap::new()),
                routes: RwLock::new(RoutingTable::new()),
                metrics: CoordinatorMetrics::new(),
                events,
                health_task: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Create a coordinator and start health polling when enabled
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: CoordinatorConfig) -> Self {
        let coordinator = Self::new(config);
        if coordinator.config().enable_health_check {
            coordinator.start_health_check();
        }
        coordinator
    }

    /// Build distributors through `factories` and install the routing table
    ///
    /// # Errors
    /// - Unknown protocol or factory failure for any distributor
    /// - Invalid or duplicate registration
    #[instrument(
        name = "coordinator_from_blueprint",
        skip(blueprint, factories),
        fields(distributors = blueprint.distributors.len(), routes = blueprint.routes.len())
    )]
    pub async fn from_blueprint(
        blueprint: &RelayBlueprint,
        factories: &FactoryRegistry,
    ) -> Result<Self, DistributionError> {
        let coordinator = Self::new(blueprint.coordinator.clone());

        for spec in &blueprint.distributors {
            let instance = match factories
                .create(&spec.protocol, &spec.name, spec.effective_config())
                .await
            {
                Ok(instance) => instance,
                Err(e) => {
                    coordinator.cleanup().await;
                    return Err(e.into());
                }
            };
            if let Err(e) = coordinator.register_distributor(spec.name.clone(), instance) {
                coordinator.cleanup().await;
                return Err(e);
            }
        }

        for route in &blueprint.routes {
            let route = EventRoute::from(route);
            coordinator.set_event_routing(route.event, route.targets, route.options);
        }

        if coordinator.config().enable_health_check {
            coordinator.start_health_check();
        }

        Ok(coordinator)
    }

    // ===== Registry =====

    /// Register `instance` under `name` and start connecting it
    ///
    /// Connection happens in a spawned task; a connect failure leaves the
    /// distributor registered in `Error` health and is published as
    /// `distributor:error`.
    ///
    /// # Errors
    /// - [`DistributionError::InvalidDistributor`] when the instance cannot send
    ///   or the name is empty / reserved
    /// - [`DistributionError::DuplicateDistributor`] when `name` is taken
    /// - [`DistributionError::ShutDown`] after [`cleanup`](Self::cleanup)
    /// - [`DistributionError::NoRuntime`] outside a Tokio runtime
    pub fn register_distributor(
        &self,
        name: impl Into<String>,
        instance: Arc<dyn Distributor>,
    ) -> Result<(), DistributionError> {
        let name = name.into();

        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(DistributionError::ShutDown);
        }
        if name.is_empty() || name == ALL_TARGETS {
            return Err(DistributionError::invalid_distributor(
                name,
                "name must be non-empty and not reserved",
            ));
        }
        if !instance.capabilities().send {
            return Err(DistributionError::invalid_distributor(
                name,
                "distributor does not declare the send capability",
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| DistributionError::NoRuntime { name: name.clone() })?;

        {
            let mut distributors = self.inner.distributors.write();
            if distributors.contains_key(&name) {
                return Err(DistributionError::duplicate(name));
            }
            distributors.insert(
                name.clone(),
                Arc::new(DistributorHandle::new(name.clone(), Arc::clone(&instance))),
            );
        }

        info!(distributor = %name, "Distributor registered");
        self.inner
            .events
            .publish(RelayEvent::DistributorRegistered { name: name.clone() });

        let events = self.inner.events.clone();
        runtime.spawn(async move {
            match instance.connect().await {
                Ok(()) => {
                    debug!(distributor = %name, "Distributor connected");
                    events.publish(RelayEvent::DistributorConnected { name });
                }
                Err(e) => {
                    instance.core().mark_error(e.to_string());
                    error!(distributor = %name, error = %e, "Distributor connect failed");
                    events.publish(RelayEvent::DistributorError {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        });

        Ok(())
    }

    /// Remove `name` and clean up its instance
    ///
    /// Returns false when nothing is registered under `name`. Cleanup
    /// failures are logged, never returned.
    #[instrument(name = "coordinator_unregister", skip(self))]
    pub async fn unregister_distributor(&self, name: &str) -> bool {
        let Some(handle) = self.inner.distributors.write().remove(name) else {
            return false;
        };

        if let Err(e) = handle.instance().cleanup().await {
            error!(distributor = %name, error = %e, "Cleanup failed during unregister");
        }

        info!(distributor = %name, "Distributor unregistered");
        self.inner.events.publish(RelayEvent::DistributorUnregistered {
            name: name.to_string(),
        });
        true
    }

    /// Enable or disable a registered distributor
    ///
    /// Returns false when `name` is unknown.
    pub fn set_distributor_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.inner.distributors.read().get(name) {
            Some(handle) => {
                handle.set_enabled(enabled);
                info!(distributor = %name, enabled, "Distributor toggled");
                true
            }
            None => false,
        }
    }

    /// Registered names, sorted
    pub fn distributors(&self) -> Vec<String> {
        self.inner.distributors.read().keys().cloned().collect()
    }

    pub fn distributor(&self, name: &str) -> Option<Arc<dyn Distributor>> {
        self.inner
            .distributors
            .read()
            .get(name)
            .map(|handle| Arc::clone(handle.instance()))
    }

    pub fn distributor_stats(&self) -> Vec<DistributorStats> {
        self.handles().iter().map(|h| h.instance().stats()).collect()
    }

    fn handles(&self) -> Vec<Arc<DistributorHandle>> {
        self.inner.distributors.read().values().cloned().collect()
    }

    // ===== Dispatch =====

    /// Send `event` to `targets` concurrently
    ///
    /// `Targets::All` selects every enabled distributor. Explicit names are
    /// filtered to registered, enabled distributors with one warning per
    /// skipped name.
    #[instrument(
        name = "coordinator_distribute",
        skip(self, data, targets, options),
        fields(event = %event)
    )]
    pub async fn distribute(
        &self,
        event: &str,
        data: &Value,
        targets: impl Into<Targets>,
        options: Option<&DistributionOptions>,
    ) -> DistributionResponse {
        let selected = self.resolve_targets(&targets.into());
        self.fan_out(event, data, selected, options, SendMode::Send)
            .await
    }

    /// Send `event` through every broadcast-capable distributor
    ///
    /// Falls back to `distribute(event, data, All, options)` when no enabled
    /// distributor declares the broadcast capability.
    #[instrument(name = "coordinator_broadcast", skip(self, data, options), fields(event = %event))]
    pub async fn broadcast(
        &self,
        event: &str,
        data: &Value,
        options: Option<&DistributionOptions>,
    ) -> DistributionResponse {
        let selected: Vec<_> = self
            .handles()
            .into_iter()
            .filter(|h| h.is_active() && h.supports_broadcast())
            .collect();

        if selected.is_empty() {
            warn!(event, "No broadcast-capable distributors, falling back to distribute");
            return self.distribute(event, data, Targets::All, options).await;
        }

        self.fan_out(event, data, selected, options, SendMode::Broadcast)
            .await
    }

    fn resolve_targets(&self, targets: &Targets) -> Vec<Arc<DistributorHandle>> {
        let distributors = self.inner.distributors.read();
        match targets {
            Targets::All => distributors
                .values()
                .filter(|h| h.is_active())
                .cloned()
                .collect(),
            Targets::Named(names) => names
                .iter()
                .filter_map(|name| match distributors.get(name) {
                    Some(handle) if handle.is_active() => Some(Arc::clone(handle)),
                    Some(_) => {
                        warn!(distributor = %name, "Target distributor is disabled, skipping");
                        None
                    }
                    None => {
                        warn!(distributor = %name, "Target distributor not found, skipping");
                        None
                    }
                })
                .collect(),
        }
    }

    async fn fan_out(
        &self,
        event: &str,
        data: &Value,
        targets: Vec<Arc<DistributorHandle>>,
        options: Option<&DistributionOptions>,
        mode: SendMode,
    ) -> DistributionResponse {
        let policy = RetryPolicy::from_config(&self.inner.config.read());
        let defaults = DistributionOptions::default();
        let options = options.unwrap_or(&defaults);

        let sends = targets.iter().map(|handle| {
            let send_options = options.resolve(handle.name());
            let policy = &policy;
            async move { dispatch_one(handle, event, data, send_options, policy, mode).await }
        });
        let results = join_all(sends).await;

        self.inner.metrics.record(&results);
        let response = DistributionResponse::new(event, results);
        observability::metrics::record_distribution(&response);

        debug!(
            event,
            total = response.summary.total,
            successful = response.summary.successful,
            failed = response.summary.failed,
            "Distribution completed"
        );
        self.inner.events.publish(RelayEvent::DistributionCompleted {
            event: event.to_string(),
            summary: response.summary,
        });

        response
    }

    // ===== Routing =====

    /// Install or overwrite the route for `event`
    pub fn set_event_routing(
        &self,
        event: impl Into<String>,
        targets: impl Into<Targets>,
        options: DistributionOptions,
    ) {
        let route = EventRoute::new(event, targets.into(), options);
        let target_names = match &route.targets {
            Targets::All => vec![ALL_TARGETS.to_string()],
            Targets::Named(names) => names.clone(),
        };
        let event = route.event.clone();

        self.inner.routes.write().set(route);

        info!(event = %event, targets = ?target_names, "Event route configured");
        self.inner.events.publish(RelayEvent::RouteConfigured {
            event,
            targets: target_names,
        });
    }

    pub fn remove_event_routing(&self, event: &str) -> bool {
        self.inner.routes.write().remove(event).is_some()
    }

    /// Routes sorted by event name
    pub fn routes(&self) -> Vec<EventRoute> {
        self.inner.routes.read().routes()
    }

    /// Dispatch `event` through its configured route
    ///
    /// Route options are merged under `overrides` (overrides win). Without
    /// a route this is `distribute(event, data, All, overrides)`.
    #[instrument(name = "coordinator_route_event", skip(self, data, overrides), fields(event = %event))]
    pub async fn route_event(
        &self,
        event: &str,
        data: &Value,
        overrides: Option<&DistributionOptions>,
    ) -> DistributionResponse {
        let route = self.inner.routes.read().get(event).cloned();

        match route {
            Some(route) => {
                let options = route.merged_options(overrides);
                self.distribute(event, data, route.targets, Some(&options))
                    .await
            }
            None => {
                warn!(event, "No route configured, distributing to all");
                self.distribute(event, data, Targets::All, overrides).await
            }
        }
    }

    // ===== Health =====

    /// Read every distributor's health once
    ///
    /// Advisory: unhealthy distributors are logged and published as
    /// `health:warning` but remain eligible for dispatch.
    #[instrument(name = "coordinator_health_check", skip(self))]
    pub async fn perform_health_check(&self) -> HealthReport {
        let handles = self.handles();
        let report = collect_report(&handles).await;
        observability::metrics::record_health(&report);

        if report.summary.unhealthy > 0 {
            let unhealthy: Vec<String> = report
                .unhealthy_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            warn!(
                unhealthy = report.summary.unhealthy,
                total = report.summary.total,
                distributors = ?unhealthy,
                "Unhealthy distributors detected"
            );
            self.inner
                .events
                .publish(RelayEvent::HealthWarning { unhealthy });
        } else {
            debug!(total = report.summary.total, "All distributors healthy");
        }

        self.inner.events.publish(RelayEvent::HealthChecked {
            report: report.clone(),
        });
        report
    }

    /// Start (or restart) periodic health polling
    ///
    /// The first poll runs one interval after this call.
    pub fn start_health_check(&self) {
        self.stop_health_check();

        let period = self.config().health_check_interval();
        if period.is_zero() {
            warn!("Health check interval is zero, polling not started");
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = spawn_poller(period, move || {
            let inner = weak.upgrade()?;
            Some(async move {
                DistributionCoordinator { inner }.perform_health_check().await;
            })
        });

        *self.inner.health_task.lock() = Some(task);
        info!(interval_ms = period.as_millis() as u64, "Health check started");
    }

    /// Stop periodic health polling
    ///
    /// Returns true when a poller was running.
    pub fn stop_health_check(&self) -> bool {
        match self.inner.health_task.lock().take() {
            Some(task) => {
                task.abort();
                debug!("Health check stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_health_check_running(&self) -> bool {
        self.inner
            .health_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // ===== Stats / config =====

    pub fn stats(&self) -> DistributionStats {
        let distributors = self.distributors();
        DistributionStats {
            distributor_count: distributors.len(),
            distributors,
            routing_rules: self.inner.routes.read().len(),
            performance: self.inner.metrics.snapshot(),
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.inner.config.read().clone()
    }

    /// Merge `patch` into the config
    ///
    /// When a health setting changes, polling is stopped and restarted if
    /// still enabled. Returns the resulting config.
    pub fn update_config(&self, patch: CoordinatorConfigPatch) -> CoordinatorConfig {
        let (config, health_changed) = {
            let mut config = self.inner.config.write();
            let changed = config.apply(&patch);
            (config.clone(), changed)
        };

        if health_changed {
            self.stop_health_check();
            if config.enable_health_check && !self.inner.shut_down.load(Ordering::Acquire) {
                self.start_health_check();
            }
        }

        info!(?patch, "Coordinator config updated");
        self.inner.events.publish(RelayEvent::ConfigUpdated {
            config: config.clone(),
        });
        config
    }

    /// Receiver for coordinator notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.inner.events.subscribe()
    }

    /// Stop polling, clean up every distributor, drop all routes
    ///
    /// Non-reversible; later registrations fail with `ShutDown`. Safe to
    /// call more than once.
    #[instrument(name = "coordinator_cleanup", skip(self))]
    pub async fn cleanup(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.stop_health_check();

        let handles: Vec<_> = std::mem::take(&mut *self.inner.distributors.write())
            .into_values()
            .collect();

        let cleanups = handles.iter().map(|handle| async move {
            if let Err(e) = handle.instance().cleanup().await {
                error!(distributor = %handle.name(), error = %e, "Cleanup failed");
            }
        });
        join_all(cleanups).await;

        self.inner.routes.write().clear();

        info!(distributors = handles.len(), "Coordinator cleaned up");
        self.inner.events.publish(RelayEvent::CoordinatorCleanedUp);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DistributionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionCoordinator")
            .field("distributors", &self.distributors())
            .field("routing_rules", &self.inner.routes.read().len())
            .finish()
    }
}

/// Send to one target under the retry policy and time it
#[instrument(
    name = "coordinator_dispatch_one",
    skip(handle, data, options, policy),
    fields(distributor = %handle.name())
)]
async fn dispatch_one(
    handle: &DistributorHandle,
    event: &str,
    data: &Value,
    options: SendOptions,
    policy: &RetryPolicy,
    mode: SendMode,
) -> DistributionResult {
    let instance = handle.instance();
    let options = &options;
    let start = Instant::now();

    let outcome = policy
        .run(|_| async move {
            match mode {
                SendMode::Send => instance.send(event, data, options).await,
                SendMode::Broadcast => instance.broadcast(event, data, options).await,
            }
        })
        .await;

    let elapsed = start.elapsed();
    match outcome.result {
        Ok(value) => DistributionResult::success(handle.name(), value, elapsed, outcome.attempts),
        Err(e) => {
            error!(
                distributor = %handle.name(),
                event,
                attempts = outcome.attempts,
                error = %e,
                "Distribution failed"
            );
            DistributionResult::failure(handle.name(), &e, elapsed, outcome.attempts)
        }
    }
}
