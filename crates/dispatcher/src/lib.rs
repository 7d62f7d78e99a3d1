//! # Dispatcher
//!
//! Event distribution across heterogeneous transports.
//!
//! Responsibilities:
//! - Registry of named [`Distributor`](contracts::Distributor)s
//! - Event routing table
//! - Concurrent fan-out with per-target retry and fault isolation
//! - Advisory health polling and aggregate statistics
//! - Built-in `log` / `udp` / `file` / `memory` distributors

pub mod coordinator;
pub mod distributors;
pub mod error;
pub mod events;
pub mod handle;
pub mod health;
pub mod metrics;
pub mod retry;
pub mod routing;

pub use contracts::{DistributionOptions, DistributionResponse, Targets};
pub use coordinator::{DistributionCoordinator, DistributionStats};
pub use distributors::{
    builtin_factories, FileDistributor, LogDistributor, MemoryDistributor, RelayedMessage,
    UdpDistributor,
};
pub use error::DistributionError;
pub use events::{EventBus, RelayEvent};
pub use handle::DistributorHandle;
pub use metrics::{CoordinatorMetrics, PerformanceStats};
pub use retry::{Backoff, RetryOutcome, RetryPolicy};
pub use routing::{EventRoute, RoutingTable};
