//! Coordinator counters for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

use contracts::DistributionResult;

/// Aggregate per-target counters of a coordinator
#[derive(Debug)]
pub struct CoordinatorMetrics {
    started_at: Instant,
    /// Per-target dispatches
    total_messages: AtomicU64,
    /// Per-target final failures
    total_errors: AtomicU64,
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_messages: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Count every result of one call
    pub fn record(&self, results: &[DistributionResult]) {
        let failed = results.iter().filter(|r| !r.is_success()).count() as u64;
        self.total_messages
            .fetch_add(results.len() as u64, Ordering::Relaxed);
        self.total_errors.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PerformanceStats {
        let total_messages = self.total_messages();
        let total_errors = self.total_errors();
        let success_rate = if total_messages > 0 {
            total_messages.saturating_sub(total_errors) as f64 / total_messages as f64 * 100.0
        } else {
            0.0
        };

        PerformanceStats {
            total_messages,
            total_errors,
            success_rate,
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// Snapshot of coordinator counters (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_messages: u64,
    pub total_errors: u64,
    /// Percent of dispatches that succeeded; 0 before any dispatch
    pub success_rate: f64,
    pub uptime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_success_rate_without_messages_is_zero() {
        let metrics = CoordinatorMetrics::new();
        assert_eq!(metrics.snapshot().success_rate, 0.0);
    }

    #[test]
    fn test_record_counts_each_result() {
        let metrics = CoordinatorMetrics::new();
        metrics.record(&[
            DistributionResult::success("a", json!(null), Duration::ZERO, 1),
            DistributionResult::success("b", json!(null), Duration::ZERO, 1),
            DistributionResult::success("c", json!(null), Duration::ZERO, 1),
            DistributionResult::failure("d", &ContractError::transport("x"), Duration::ZERO, 3),
        ]);

        let stats = metrics.snapshot();
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.total_errors, 1);
        assert!((stats.success_rate - 75.0).abs() < 1e-10);
    }
}
