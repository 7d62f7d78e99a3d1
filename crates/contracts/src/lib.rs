//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Contents
//! - [`Distributor`]: the capability contract every transport adapter implements
//! - [`DistributorCore`]: health/stats/config bookkeeping embedded by adapters
//! - Distribution data model ([`DistributionResult`], [`DistributionResponse`])
//! - Health model ([`HealthSnapshot`], [`HealthReport`])
//! - [`FactoryRegistry`]: protocol name -> adapter constructor
//! - [`RelayBlueprint`]: declarative configuration consumed by the config loader
//!
//! ## Time Model
//! - Wall-clock timestamps are `chrono::DateTime<Utc>`
//! - Durations and uptimes are reported in milliseconds

mod blueprint;
mod bookkeeping;
mod distribution;
mod distributor;
mod error;
mod factory;
mod health;

pub use blueprint::*;
pub use bookkeeping::{DistributorCore, ENABLED_KEY};
pub use distribution::*;
pub use distributor::*;
pub use error::*;
pub use factory::{DistributorFactory, FactoryRegistry, FnFactory};
pub use health::*;
