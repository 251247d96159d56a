//! Utility modules for common functionality.
//!
//! - logging: Logging setup and error context types
//! - tests: Test utilities

pub mod logging;
pub mod tests;
