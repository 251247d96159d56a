//! Chain descriptor loading and validation.
//!
//! Implements [`ConfigLoader`] for [`ChainDescriptor`] so that chains beyond the built-in
//! table can be declared as JSON files (one descriptor per file).

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};
use url::Url;

use crate::models::{ChainDescriptor, ChainKind, ConfigError, ConfigLoader};

/// Parachain ids below this value are reserved for system parachains
const SYSTEM_PARACHAIN_ID_LIMIT: u32 = 2000;

fn path_metadata(path: &Path) -> Option<HashMap<String, String>> {
	Some(HashMap::from([(
		"path".to_string(),
		path.display().to_string(),
	)]))
}

#[async_trait]
impl ConfigLoader for ChainDescriptor {
	/// Load all chain descriptors from a directory
	///
	/// Reads every JSON file in the directory (default `config/chains`). The returned
	/// pairs are keyed by chain id.
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let chain_dir = path.unwrap_or(Path::new("config/chains"));
		let mut pairs: Vec<(String, Self)> = Vec::new();

		if !chain_dir.exists() {
			return Err(ConfigError::file_error(
				"chains directory not found",
				None,
				path_metadata(chain_dir),
			));
		}

		let entries = std::fs::read_dir(chain_dir).map_err(|e| {
			ConfigError::file_error(
				format!("failed to read chains directory: {}", e),
				Some(Box::new(e)),
				path_metadata(chain_dir),
			)
		})?;

		for entry in entries {
			let entry = entry.map_err(|e| {
				ConfigError::file_error(
					format!("failed to read directory entry: {}", e),
					Some(Box::new(e)),
					path_metadata(chain_dir),
				)
			})?;
			let path = entry.path();

			if !Self::is_json_file(&path) {
				continue;
			}

			let chain = Self::load_from_path(&path).await?;

			let existing: Vec<&ChainDescriptor> = pairs.iter().map(|(_, chain)| chain).collect();
			Self::validate_uniqueness(&existing, &chain, &path.display().to_string())?;

			pairs.push((chain.id.clone(), chain));
		}

		Ok(T::from_iter(pairs))
	}

	/// Load a chain descriptor from a specific file
	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let file = std::fs::File::open(path).map_err(|e| {
			ConfigError::file_error(
				format!("failed to open chain config file: {}", e),
				Some(Box::new(e)),
				path_metadata(path),
			)
		})?;
		let config: ChainDescriptor = serde_json::from_reader(file).map_err(|e| {
			ConfigError::parse_error(
				format!("failed to parse chain config: {}", e),
				Some(Box::new(e)),
				path_metadata(path),
			)
		})?;

		config.validate()?;
		config.validate_protocol();

		Ok(config)
	}

	/// Validate the chain descriptor
	///
	/// Ensures that:
	/// - The id only uses lowercase letters, digits and underscores
	/// - The display name is set
	/// - At least one `ws://` or `wss://` endpoint is configured
	/// - Relay chains do not point at a relay, parachains do
	/// - Parachain ids fall in the range matching the chain kind
	fn validate(&self) -> Result<(), ConfigError> {
		if self.id.is_empty()
			|| !self
				.id
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
		{
			return Err(ConfigError::validation_error(
				"Chain id must contain only lowercase letters, numbers, and underscores",
				None,
				Some(HashMap::from([("id".to_string(), self.id.clone())])),
			));
		}

		if self.display_name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Chain display name is required",
				None,
				Some(HashMap::from([("id".to_string(), self.id.clone())])),
			));
		}

		if self.socket_endpoints.is_empty() {
			return Err(ConfigError::validation_error(
				"At least one socket endpoint is required",
				None,
				Some(HashMap::from([("id".to_string(), self.id.clone())])),
			));
		}

		for endpoint in &self.socket_endpoints {
			let url = Url::parse(endpoint).map_err(|e| {
				ConfigError::validation_error(
					format!("Invalid socket endpoint: {}", e),
					Some(Box::new(e)),
					Some(HashMap::from([("endpoint".to_string(), endpoint.clone())])),
				)
			})?;
			if !matches!(url.scheme(), "ws" | "wss") {
				return Err(ConfigError::validation_error(
					"Socket endpoints must use the ws:// or wss:// scheme",
					None,
					Some(HashMap::from([("endpoint".to_string(), endpoint.clone())])),
				));
			}
		}

		match (self.kind, &self.relay_chain_id) {
			(ChainKind::Relay, Some(relay)) => {
				return Err(ConfigError::validation_error(
					"Relay chains cannot depend on another relay chain",
					None,
					Some(HashMap::from([
						("id".to_string(), self.id.clone()),
						("relay_chain_id".to_string(), relay.clone()),
					])),
				));
			}
			(ChainKind::SystemParachain | ChainKind::Parachain, None) => {
				return Err(ConfigError::validation_error(
					"Parachains must declare their relay chain",
					None,
					Some(HashMap::from([("id".to_string(), self.id.clone())])),
				));
			}
			(ChainKind::SystemParachain | ChainKind::Parachain, Some(relay))
				if *relay == self.id =>
			{
				return Err(ConfigError::validation_error(
					"A parachain cannot be its own relay chain",
					None,
					Some(HashMap::from([("id".to_string(), self.id.clone())])),
				));
			}
			_ => {}
		}

		if let Some(para_id) = self.numeric_chain_id {
			let in_range = match self.kind {
				ChainKind::Relay => false,
				ChainKind::SystemParachain => para_id > 0 && para_id < SYSTEM_PARACHAIN_ID_LIMIT,
				ChainKind::Parachain => para_id >= SYSTEM_PARACHAIN_ID_LIMIT,
			};
			if !in_range {
				return Err(ConfigError::validation_error(
					"Numeric chain id does not match the chain kind",
					None,
					Some(HashMap::from([
						("id".to_string(), self.id.clone()),
						("numeric_chain_id".to_string(), para_id.to_string()),
					])),
				));
			}
		}

		Ok(())
	}

	fn validate_protocol(&self) {
		for endpoint in &self.socket_endpoints {
			if endpoint.starts_with("ws://") {
				tracing::warn!(
					chain = %self.id,
					endpoint = %endpoint,
					"Chain uses an unencrypted ws:// endpoint. Use wss:// in production."
				);
			}
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		if instances.iter().any(|c| c.id == current_instance.id) {
			return Err(ConfigError::validation_error(
				format!("Duplicate chain id found: '{}'", current_instance.id),
				None,
				Some(HashMap::from([
					("id".to_string(), current_instance.id.clone()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}
		Ok(())
	}
}
