//! # Session Manager
//!
//! Scopes a set of distributors to a session identity. Each session builds
//! its own instances through a [`FactoryRegistry`](contracts::FactoryRegistry)
//! under composite ids (`{protocol}_{session_id}`), keeps a private routing
//! table and goes through `initializing -> active -> ended` exactly once.
//!
//! Unlike the coordinator, session dispatch is health gated: a distributor
//! whose `is_healthy()` is false is skipped for that message.

pub mod error;
pub mod manager;
pub mod session;

pub use error::SessionError;
pub use manager::{routing_key, SessionManager};
pub use session::{Session, SessionState, SessionStats, SessionStatus};
