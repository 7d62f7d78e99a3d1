//! Relay orchestration module.

mod runner;
mod stats;

pub use runner::{Relay, RelayConfig};
pub use stats::RelayStats;
