//! Dispatcher error types

use thiserror::Error;

/// Coordinator lifecycle errors
///
/// Transport failures never surface here; they are recorded inside the
/// per-target [`DistributionResult`](contracts::DistributionResult).
#[derive(Debug, Error)]
pub enum DistributionError {
    /// Instance does not satisfy the capability contract
    #[error("invalid distributor '{name}': {reason}")]
    InvalidDistributor { name: String, reason: String },

    /// Name already registered
    #[error("distributor '{name}' is already registered")]
    DuplicateDistributor { name: String },

    /// Coordinator already cleaned up
    #[error("coordinator has been shut down")]
    ShutDown,

    /// Registration needs a Tokio runtime to start connecting
    #[error("no Tokio runtime available to connect '{name}'")]
    NoRuntime { name: String },

    #[error("distributor error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DistributionError {
    pub fn invalid_distributor(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDistributor {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateDistributor { name: name.into() }
    }
}
