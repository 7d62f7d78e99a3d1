//! Layered error definitions
//!
//! Categorized by source: config / lifecycle / transport

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// No factory registered for a protocol
    #[error("unknown protocol '{protocol}'")]
    UnknownProtocol { protocol: String },

    // ===== Lifecycle Errors =====
    /// Capability left unimplemented by the adapter
    #[error("distributor '{distributor}' does not implement '{operation}'")]
    NotImplemented {
        distributor: String,
        operation: String,
    },

    /// Connection could not be established
    #[error("distributor '{distributor}' connection error: {message}")]
    Connection { distributor: String, message: String },

    /// Operation attempted after cleanup
    #[error("distributor '{distributor}' is stopped")]
    Stopped { distributor: String },

    // ===== Transport Errors =====
    /// Transport-level send failure, message is reported verbatim
    #[error("{0}")]
    Transport(String),

    /// Send exceeded its timeout
    #[error("distributor '{distributor}' timed out after {timeout_ms}ms")]
    Timeout { distributor: String, timeout_ms: u64 },

    /// Payload encoding error
    #[error("serialization error: {message}")]
    Serialization { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unimplemented capability error
    pub fn not_implemented(distributor: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            distributor: distributor.into(),
            operation: operation.into(),
        }
    }

    /// Create connection error
    pub fn connection(distributor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            distributor: distributor.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create stopped error
    pub fn stopped(distributor: impl Into<String>) -> Self {
        Self::Stopped {
            distributor: distributor.into(),
        }
    }
}
