//! Core services implementing the business logic.
//!
//! - `connection`: connection sharing, light-client chain loading, readiness, reconnection and
//!   teardown
pub mod connection;
