//! Relay run statistics.

use std::time::Duration;

use observability::DeliveryMetricsAggregator;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Non-empty input lines read
    pub lines_read: u64,

    /// Lines that were not a valid event
    pub parse_errors: u64,

    /// Events handed to the coordinator
    pub events_relayed: u64,

    /// Events handed to a session
    pub session_messages: u64,

    /// Session events that reached no distributor
    pub session_undelivered: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Distributors registered at startup
    pub distributors: usize,

    /// Sessions opened at startup
    pub sessions: usize,

    /// Per-delivery aggregation of coordinator responses
    pub delivery: DeliveryMetricsAggregator,
}

impl RelayStats {
    /// Events per second across coordinator and sessions
    pub fn events_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.events_relayed + self.session_messages) as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Relay Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Parse errors: {}", self.parse_errors);
        println!("   ├─ Events relayed: {}", self.events_relayed);
        println!(
            "   ├─ Session messages: {} ({} undelivered)",
            self.session_messages, self.session_undelivered
        );
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!("   ├─ Distributors: {}", self.distributors);
        println!("   └─ Sessions: {}", self.sessions);

        println!("\n{}", self.delivery.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_per_sec_counts_both_paths() {
        let stats = RelayStats {
            events_relayed: 6,
            session_messages: 4,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.events_per_sec() - 5.0).abs() < 1e-10);
        assert_eq!(RelayStats::default().events_per_sec(), 0.0);
    }
}
