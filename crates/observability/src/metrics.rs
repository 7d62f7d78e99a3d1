//! Delivery metrics
//!
//! Prometheus recording through the `metrics` facade, plus an in-memory
//! aggregator for end-of-run summaries.

use contracts::{DistributionResponse, DistributionResult, HealthReport};
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;

/// Record one distribute call and each of its per-target results
///
/// # Example
///
/// ```ignore
/// let response = coordinator.route_event("alert", &payload, None).await;
/// observability::metrics::record_distribution(&response);
/// ```
pub fn record_distribution(response: &DistributionResponse) {
    counter!("event_relay_distributions_total", "event" => response.event.clone()).increment(1);

    for result in &response.results {
        record_delivery(result);
    }
}

/// Record one per-target result
pub fn record_delivery(result: &DistributionResult) {
    let status = if result.is_success() { "success" } else { "error" };
    counter!(
        "event_relay_deliveries_total",
        "distributor" => result.distributor.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "event_relay_delivery_duration_ms",
        "distributor" => result.distributor.clone()
    )
    .record(result.duration_ms as f64);

    if result.attempts > 1 {
        record_retries(&result.distributor, result.attempts - 1);
    }
}

pub fn record_retries(distributor: &str, retries: u32) {
    counter!(
        "event_relay_retries_total",
        "distributor" => distributor.to_string()
    )
    .increment(u64::from(retries));
}

/// Record the outcome of a health poll
pub fn record_health(report: &HealthReport) {
    gauge!("event_relay_health_healthy").set(report.summary.healthy as f64);
    gauge!("event_relay_health_unhealthy").set(report.summary.unhealthy as f64);
}

/// Record one session-level distribute call
pub fn record_session_distribution(delivered: bool) {
    let status = if delivered { "delivered" } else { "undelivered" };
    counter!("event_relay_session_distributions_total", "status" => status).increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!("event_relay_sessions_active").set(count as f64);
}

/// Delivery aggregator
///
/// Aggregates responses in memory for summary output.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMetricsAggregator {
    /// Distribute calls seen
    pub total_events: u64,

    /// Per-target deliveries seen
    pub total_deliveries: u64,

    pub failed_deliveries: u64,

    /// Extra attempts beyond the first
    pub total_retries: u64,

    /// Calls where no target was selected
    pub events_without_targets: u64,

    pub duration_stats: RunningStats,

    /// Per-distributor (deliveries, failures)
    pub per_distributor: HashMap<String, (u64, u64)>,
}

impl DeliveryMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, response: &DistributionResponse) {
        self.total_events += 1;
        if response.results.is_empty() {
            self.events_without_targets += 1;
        }

        for result in &response.results {
            self.total_deliveries += 1;
            self.total_retries += u64::from(result.attempts.saturating_sub(1));
            self.duration_stats.push(result.duration_ms as f64);

            let entry = self
                .per_distributor
                .entry(result.distributor.clone())
                .or_insert((0, 0));
            entry.0 += 1;
            if !result.is_success() {
                self.failed_deliveries += 1;
                entry.1 += 1;
            }
        }
    }

    pub fn summary(&self) -> DeliverySummary {
        DeliverySummary {
            total_events: self.total_events,
            total_deliveries: self.total_deliveries,
            failed_deliveries: self.failed_deliveries,
            total_retries: self.total_retries,
            events_without_targets: self.events_without_targets,
            failure_rate: if self.total_deliveries > 0 {
                self.failed_deliveries as f64 / self.total_deliveries as f64 * 100.0
            } else {
                0.0
            },
            duration_ms: StatsSummary::from(&self.duration_stats),
            per_distributor: self.per_distributor.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_events: u64,
    pub total_deliveries: u64,
    pub failed_deliveries: u64,
    pub total_retries: u64,
    pub events_without_targets: u64,
    /// Percent of deliveries that failed
    pub failure_rate: f64,
    pub duration_ms: StatsSummary,
    pub per_distributor: HashMap<String, (u64, u64)>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Events: {}", self.total_events)?;
        writeln!(
            f,
            "Deliveries: {} ({} failed, {:.2}%)",
            self.total_deliveries, self.failed_deliveries, self.failure_rate
        )?;
        writeln!(f, "Retries: {}", self.total_retries)?;
        writeln!(f, "Events without targets: {}", self.events_without_targets)?;
        writeln!(f, "Delivery duration (ms): {}", self.duration_ms)?;

        if !self.per_distributor.is_empty() {
            writeln!(f, "Per distributor:")?;
            let mut names: Vec<_> = self.per_distributor.iter().collect();
            names.sort_by(|a, b| a.0.cmp(b.0));
            for (name, (deliveries, failures)) in names {
                writeln!(f, "  {name}: {deliveries} sent, {failures} failed")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
