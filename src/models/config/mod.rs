//! Configuration loading and validation.
//!
//! This module provides the [`ConfigLoader`] trait used to read chain descriptors from
//! JSON files, and the [`ManagerConfig`] options consumed by the connection manager.

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use std::path::Path;

mod chain_config;
mod error;
mod manager_config;

pub use error::ConfigError;
pub use manager_config::{
	default_disconnect_markers, AcquireOptions, ManagerConfig, MAX_RECONNECT_ATTEMPTS_LIMIT,
};

/// Common interface for loading configuration files
#[async_trait]
pub trait ConfigLoader: Sized {
	/// Load all configuration files from a directory
	///
	/// If no path is provided, uses the default config directory.
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>;

	/// Load configuration from a specific file path
	async fn load_from_path(path: &Path) -> Result<Self, ConfigError>;

	/// Validate the configuration
	fn validate(&self) -> Result<(), ConfigError>;

	/// Logs a warning for settings that work but are unsafe
	fn validate_protocol(&self);

	/// Check if a file is a JSON file based on extension
	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}

	/// Validate uniqueness of `current_instance` against already loaded `instances`
	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError>;
}
