//! Connection manager options.
//!
//! Options are plain structured values: they can be built in code, deserialized from a JSON
//! file, and overridden from `SUBSTRATE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

use crate::models::{ConfigError, TransportMode};

/// Upper bound for `max_reconnect_attempts`; keeps `base * 2^attempt` well inside `Duration`
pub const MAX_RECONNECT_ATTEMPTS_LIMIT: u32 = 32;

/// --- Default values for manager configuration settings ---
fn default_timeout_ms() -> u64 {
	30_000
}

fn default_max_reconnect_attempts() -> u32 {
	5
}

fn default_base_backoff_ms() -> u64 {
	1_000
}

fn default_probe_interval_ms() -> u64 {
	10_000
}

fn default_light_client_enabled() -> bool {
	true
}

/// Error message fragments that mark a liveness-probe failure as a disconnect
pub fn default_disconnect_markers() -> Vec<String> {
	vec![
		"ChainHead disjointed".to_string(),
		"Connection closed".to_string(),
	]
}

/// Configuration of the connection manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
	/// Transport used when a caller does not ask for one explicitly
	#[serde(default)]
	pub transport_mode: TransportMode,
	/// Readiness timeout in milliseconds
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Reconnect attempts before a connection is declared failed
	#[serde(default = "default_max_reconnect_attempts")]
	pub max_reconnect_attempts: u32,
	/// Delay before the first reconnect attempt; doubles for every further attempt
	#[serde(default = "default_base_backoff_ms")]
	pub base_backoff_ms: u64,
	/// Interval of the liveness probe run by the reconnection supervisor
	#[serde(default = "default_probe_interval_ms")]
	pub probe_interval_ms: u64,
	/// Message fragments classifying probe errors as disconnects
	#[serde(default = "default_disconnect_markers")]
	pub disconnect_markers: Vec<String>,
	/// Allows light-client connections when a runtime and chain specs are available
	#[serde(default = "default_light_client_enabled")]
	pub light_client_enabled: bool,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			transport_mode: TransportMode::default(),
			timeout_ms: default_timeout_ms(),
			max_reconnect_attempts: default_max_reconnect_attempts(),
			base_backoff_ms: default_base_backoff_ms(),
			probe_interval_ms: default_probe_interval_ms(),
			disconnect_markers: default_disconnect_markers(),
			light_client_enabled: default_light_client_enabled(),
		}
	}
}

impl ManagerConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	pub fn base_backoff(&self) -> Duration {
		Duration::from_millis(self.base_backoff_ms)
	}

	pub fn probe_interval(&self) -> Duration {
		Duration::from_millis(self.probe_interval_ms)
	}

	/// Reads the configuration from a JSON file and validates it.
	pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let file = std::fs::File::open(path).map_err(|e| {
			ConfigError::file_error(
				format!("failed to open manager config file: {}", e),
				Some(Box::new(e)),
				Some(HashMap::from([(
					"path".to_string(),
					path.display().to_string(),
				)])),
			)
		})?;
		let config: Self = serde_json::from_reader(file).map_err(|e| {
			ConfigError::parse_error(
				format!("failed to parse manager config: {}", e),
				Some(Box::new(e)),
				Some(HashMap::from([(
					"path".to_string(),
					path.display().to_string(),
				)])),
			)
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Applies `SUBSTRATE_*` overrides from the process environment.
	pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
		self.with_overrides(|name| std::env::var(name).ok())
	}

	/// Applies overrides resolved through `lookup`, then validates the result.
	///
	/// Recognized names: `SUBSTRATE_TRANSPORT_MODE` (`socket` | `light_client`),
	/// `SUBSTRATE_TIMEOUT_MS`, `SUBSTRATE_MAX_RECONNECT_ATTEMPTS`, `SUBSTRATE_BASE_BACKOFF_MS`,
	/// `SUBSTRATE_PROBE_INTERVAL_MS`, `SUBSTRATE_LIGHT_CLIENT` (`true` | `false`).
	pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(mode) = lookup("SUBSTRATE_TRANSPORT_MODE") {
			self.transport_mode = match mode.to_lowercase().as_str() {
				"socket" => TransportMode::Socket,
				"light_client" | "lightclient" => TransportMode::LightClient,
				other => {
					return Err(ConfigError::validation_error(
						format!("Unknown transport mode '{}'", other),
						None,
						None,
					))
				}
			};
		}
		if let Some(value) = lookup("SUBSTRATE_TIMEOUT_MS") {
			self.timeout_ms = parse_override("SUBSTRATE_TIMEOUT_MS", &value)?;
		}
		if let Some(value) = lookup("SUBSTRATE_MAX_RECONNECT_ATTEMPTS") {
			self.max_reconnect_attempts =
				parse_override("SUBSTRATE_MAX_RECONNECT_ATTEMPTS", &value)?;
		}
		if let Some(value) = lookup("SUBSTRATE_BASE_BACKOFF_MS") {
			self.base_backoff_ms = parse_override("SUBSTRATE_BASE_BACKOFF_MS", &value)?;
		}
		if let Some(value) = lookup("SUBSTRATE_PROBE_INTERVAL_MS") {
			self.probe_interval_ms = parse_override("SUBSTRATE_PROBE_INTERVAL_MS", &value)?;
		}
		if let Some(value) = lookup("SUBSTRATE_LIGHT_CLIENT") {
			self.light_client_enabled = parse_override("SUBSTRATE_LIGHT_CLIENT", &value)?;
		}

		self.validate()?;
		Ok(self)
	}

	/// Checks that timing values are usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.timeout_ms == 0 {
			return Err(ConfigError::validation_error(
				"timeout_ms must be greater than zero",
				None,
				None,
			));
		}
		if self.probe_interval_ms == 0 {
			return Err(ConfigError::validation_error(
				"probe_interval_ms must be greater than zero",
				None,
				None,
			));
		}
		if self.max_reconnect_attempts > MAX_RECONNECT_ATTEMPTS_LIMIT {
			return Err(ConfigError::validation_error(
				format!(
					"max_reconnect_attempts must not exceed {}",
					MAX_RECONNECT_ATTEMPTS_LIMIT
				),
				None,
				Some(HashMap::from([(
					"max_reconnect_attempts".to_string(),
					self.max_reconnect_attempts.to_string(),
				)])),
			));
		}
		Ok(())
	}
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
	value.trim().parse::<T>().map_err(|_| {
		ConfigError::validation_error(
			format!("Invalid value for {}", name),
			None,
			Some(HashMap::from([(name.to_string(), value.to_string())])),
		)
	})
}

/// Per-call options of [`ConnectionManager::acquire`](crate::services::connection::ConnectionManager::acquire)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireOptions {
	/// Transport to use; the manager default applies when unset
	pub mode: Option<TransportMode>,
	/// Readiness timeout; the manager default applies when unset
	pub timeout: Option<Duration>,
	/// Return without waiting for the first best block
	pub skip_ready: bool,
}

impl AcquireOptions {
	pub fn socket() -> Self {
		Self {
			mode: Some(TransportMode::Socket),
			..Self::default()
		}
	}

	pub fn light_client() -> Self {
		Self {
			mode: Some(TransportMode::LightClient),
			..Self::default()
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn without_ready_wait(mut self) -> Self {
		self.skip_ready = true;
		self
	}
}
