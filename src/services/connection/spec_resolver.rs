//! Chain specification resolution.
//!
//! Resolves the serialized chain specification a light client needs, consulting an internal
//! cache first and the injected [`ChainSpecRegistry`] second.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use crate::{repositories::ChainSpecRegistry, services::connection::ConnectionError};

/// Cached front of a [`ChainSpecRegistry`]
pub struct ChainSpecResolver {
	registry: Arc<dyn ChainSpecRegistry>,
	cache: RwLock<HashMap<String, Arc<str>>>,
}

impl ChainSpecResolver {
	pub fn new(registry: Arc<dyn ChainSpecRegistry>) -> Self {
		Self {
			registry,
			cache: RwLock::new(HashMap::new()),
		}
	}

	/// Non-failing existence check
	pub async fn has(&self, chain_id: &str) -> bool {
		if self.cache.read().await.contains_key(chain_id) {
			return true;
		}
		self.registry.has(chain_id).await
	}

	/// Returns the chain specification or [`ConnectionError::ChainSpecMissing`]
	pub async fn resolve(&self, chain_id: &str) -> Result<Arc<str>, ConnectionError> {
		if let Some(spec) = self.cache.read().await.get(chain_id) {
			tracing::debug!(chain = %chain_id, "Chain spec cache hit");
			return Ok(spec.clone());
		}

		let metadata = Some(HashMap::from([(
			"chain_id".to_string(),
			chain_id.to_string(),
		)]));
		let spec: Arc<str> = match self.registry.get(chain_id).await {
			Ok(Some(spec)) => Arc::from(spec),
			Ok(None) => {
				return Err(ConnectionError::chain_spec_missing(
					format!("No chain spec registered for '{}'", chain_id),
					None,
					metadata,
				))
			}
			Err(e) => {
				return Err(ConnectionError::chain_spec_missing(
					format!("Chain spec for '{}' could not be read", chain_id),
					Some(Box::new(e)),
					metadata,
				))
			}
		};

		// A concurrent resolve may have filled the entry meanwhile; keep the first one
		let mut cache = self.cache.write().await;
		Ok(cache
			.entry(chain_id.to_string())
			.or_insert(spec)
			.clone())
	}

	pub async fn clear_cache(&self) {
		self.cache.write().await.clear();
	}

	pub async fn cached_len(&self) -> usize {
		self.cache.read().await.len()
	}
}
