//! Domain models and data structures for chain connections.
//!
//! - `config`: Configuration loading and validation
//! - `core`: Core domain models (chain descriptors, connection keys and states)

mod config;
mod core;

// Re-export core types
pub use core::{ChainDescriptor, ChainKind, ConnectionKey, ConnectionState, TransportMode};

// Re-export config types
pub use config::{
	default_disconnect_markers, AcquireOptions, ConfigError, ConfigLoader, ManagerConfig,
	MAX_RECONNECT_ATTEMPTS_LIMIT,
};
