//! Chain registry.
//!
//! Holds the table of known chains. The registry is built once (from the built-in table,
//! optionally extended with JSON descriptors) and is immutable afterwards, so it can be
//! shared behind an `Arc` without synchronization.

#![allow(clippy::result_large_err)]

use std::{collections::HashMap, path::Path};

use crate::{
	models::{ChainDescriptor, ChainKind, ConfigLoader},
	repositories::error::RepositoryError,
	services::connection::ConnectionError,
};

/// Repository of chain descriptors keyed by chain id
#[derive(Debug, Clone)]
pub struct ChainRegistry {
	chains: HashMap<String, ChainDescriptor>,
	/// Insertion order, used by [`ChainRegistry::all`]
	order: Vec<String>,
}

impl Default for ChainRegistry {
	fn default() -> Self {
		Self::builtin()
	}
}

impl ChainRegistry {
	/// Registry containing the built-in Polkadot and Westend chains
	pub fn builtin() -> Self {
		let mut registry = Self::empty();
		for chain in builtin_chains() {
			registry.order.push(chain.id.clone());
			registry.chains.insert(chain.id.clone(), chain);
		}
		registry
	}

	/// Builds a registry from explicit descriptors
	///
	/// Fails on duplicate ids and on parachains whose relay is missing or is not a relay chain.
	pub fn from_descriptors(
		descriptors: impl IntoIterator<Item = ChainDescriptor>,
	) -> Result<Self, RepositoryError> {
		Self::insert_all(Self::empty(), descriptors)
	}

	/// Extends the registry with every descriptor found in `path` (default `config/chains`)
	pub async fn with_config_dir(self, path: Option<&Path>) -> Result<Self, RepositoryError> {
		let loaded: Vec<(String, ChainDescriptor)> =
			ChainDescriptor::load_all(path).await.map_err(|e| {
				RepositoryError::load_error(
					"Failed to load chain descriptors",
					Some(Box::new(e)),
					Some(HashMap::from([(
						"path".to_string(),
						path.map_or_else(|| "default".to_string(), |p| p.display().to_string()),
					)])),
				)
			})?;

		tracing::info!(count = loaded.len(), "Loaded chain descriptors from disk");
		Self::insert_all(self, loaded.into_iter().map(|(_, chain)| chain))
	}

	fn empty() -> Self {
		Self {
			chains: HashMap::new(),
			order: Vec::new(),
		}
	}

	fn insert_all(
		mut self,
		descriptors: impl IntoIterator<Item = ChainDescriptor>,
	) -> Result<Self, RepositoryError> {
		for chain in descriptors {
			if self.chains.contains_key(&chain.id) {
				return Err(RepositoryError::validation_error(
					format!("Chain '{}' is already registered", chain.id),
					None,
					Some(HashMap::from([("id".to_string(), chain.id.clone())])),
				));
			}
			self.order.push(chain.id.clone());
			self.chains.insert(chain.id.clone(), chain);
		}

		self.validate_relays()?;
		Ok(self)
	}

	/// Every parachain must reference a registered relay chain
	fn validate_relays(&self) -> Result<(), RepositoryError> {
		for chain in self.chains.values().filter(|c| c.is_parachain()) {
			let Some(relay_id) = chain.relay_chain_id.as_deref() else {
				return Err(RepositoryError::validation_error(
					format!("Parachain '{}' has no relay chain", chain.id),
					None,
					Some(HashMap::from([("id".to_string(), chain.id.clone())])),
				));
			};
			match self.chains.get(relay_id) {
				Some(relay) if relay.kind == ChainKind::Relay => {}
				_ => {
					return Err(RepositoryError::validation_error(
						format!(
							"Relay chain '{}' of '{}' is not a registered relay chain",
							relay_id, chain.id
						),
						None,
						Some(HashMap::from([
							("id".to_string(), chain.id.clone()),
							("relay_chain_id".to_string(), relay_id.to_string()),
						])),
					));
				}
			}
		}
		Ok(())
	}

	/// Looks a chain up by id
	pub fn lookup_by_id(&self, chain_id: &str) -> Result<&ChainDescriptor, ConnectionError> {
		self.chains.get(chain_id).ok_or_else(|| {
			ConnectionError::chain_not_found(
				format!("Unknown chain '{}'", chain_id),
				None,
				Some(HashMap::from([("chain_id".to_string(), chain_id.to_string())])),
			)
		})
	}

	/// Case-insensitive lookup by display name
	pub fn lookup_by_name(&self, name: &str) -> Option<&ChainDescriptor> {
		self.all()
			.find(|chain| chain.display_name.eq_ignore_ascii_case(name))
	}

	/// Resolves the relay chain a parachain depends on
	pub fn relay_of(&self, chain: &ChainDescriptor) -> Result<&ChainDescriptor, ConnectionError> {
		match chain.relay_chain_id.as_deref() {
			Some(relay_id) => self.lookup_by_id(relay_id),
			None => Err(ConnectionError::chain_not_found(
				format!("Chain '{}' has no relay chain", chain.id),
				None,
				Some(HashMap::from([("chain_id".to_string(), chain.id.clone())])),
			)),
		}
	}

	/// All chains in registration order
	pub fn all(&self) -> impl Iterator<Item = &ChainDescriptor> {
		self.order.iter().filter_map(|id| self.chains.get(id))
	}

	pub fn contains(&self, chain_id: &str) -> bool {
		self.chains.contains_key(chain_id)
	}

	pub fn len(&self) -> usize {
		self.chains.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}

	pub fn is_relay(chain: &ChainDescriptor) -> bool {
		chain.is_relay()
	}

	pub fn is_parachain(chain: &ChainDescriptor) -> bool {
		chain.is_parachain()
	}

	pub fn is_system_chain(chain: &ChainDescriptor) -> bool {
		chain.is_system_chain()
	}
}

fn builtin_chains() -> Vec<ChainDescriptor> {
	vec![
		ChainDescriptor {
			id: "polkadot".to_string(),
			display_name: "Polkadot".to_string(),
			spec_name: "polkadot".to_string(),
			socket_endpoints: vec!["wss://polkadot-rpc.dwellir.com".to_string()],
			relay_chain_id: None,
			kind: ChainKind::Relay,
			address_prefix: 0,
			numeric_chain_id: None,
			block_explorer_url: Some("https://polkadot.subscan.io".to_string()),
		},
		ChainDescriptor {
			id: "polkadot_asset_hub".to_string(),
			display_name: "Polkadot Asset Hub".to_string(),
			spec_name: "asset-hub-polkadot".to_string(),
			socket_endpoints: vec!["wss://polkadot-asset-hub-rpc.polkadot.io/".to_string()],
			relay_chain_id: Some("polkadot".to_string()),
			kind: ChainKind::SystemParachain,
			address_prefix: 0,
			numeric_chain_id: Some(1000),
			block_explorer_url: Some("https://assethub-polkadot.subscan.io".to_string()),
		},
		ChainDescriptor {
			id: "west".to_string(),
			display_name: "Westend".to_string(),
			spec_name: "westend".to_string(),
			socket_endpoints: vec!["wss://westend-rpc.polkadot.io".to_string()],
			relay_chain_id: None,
			kind: ChainKind::Relay,
			address_prefix: 42,
			numeric_chain_id: None,
			block_explorer_url: Some("https://westend.subscan.io".to_string()),
		},
		ChainDescriptor {
			id: "west_asset_hub".to_string(),
			display_name: "Westend Asset Hub".to_string(),
			spec_name: "asset-hub-westend".to_string(),
			socket_endpoints: vec!["wss://westend-asset-hub-rpc.polkadot.io".to_string()],
			relay_chain_id: Some("west".to_string()),
			kind: ChainKind::SystemParachain,
			address_prefix: 42,
			numeric_chain_id: Some(1000),
			block_explorer_url: Some("https://assethub-westend.subscan.io".to_string()),
		},
	]
}
