//! Session manager error types

use thiserror::Error;

use crate::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{id}' not found")]
    NotFound { id: String },

    #[error("session '{id}' already exists")]
    AlreadyExists { id: String },

    /// Session exists but is not accepting traffic
    #[error("session '{id}' is not active (state: {state})")]
    NotActive { id: String, state: SessionState },

    #[error("distributor error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl SessionError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
