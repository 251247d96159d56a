//! Chain specification registries.
//!
//! A chain specification is the JSON document a light client needs to bootstrap a chain.
//! Registries only answer "do you have it" and "give it to me"; caching lives in the
//! [`ChainSpecResolver`](crate::services::connection::ChainSpecResolver).

#![allow(clippy::result_large_err)]

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::repositories::error::RepositoryError;

/// Source of serialized chain specifications
#[async_trait]
pub trait ChainSpecRegistry: Send + Sync {
	/// Non-failing existence check
	async fn has(&self, chain_id: &str) -> bool;

	/// Returns the serialized specification, `None` when the registry has none
	async fn get(&self, chain_id: &str) -> Result<Option<String>, RepositoryError>;
}

/// Registry backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct InMemoryChainSpecRegistry {
	specs: HashMap<String, String>,
}

impl InMemoryChainSpecRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_spec(mut self, chain_id: impl Into<String>, spec: impl Into<String>) -> Self {
		self.specs.insert(chain_id.into(), spec.into());
		self
	}

	pub fn insert(&mut self, chain_id: impl Into<String>, spec: impl Into<String>) {
		self.specs.insert(chain_id.into(), spec.into());
	}
}

#[async_trait]
impl ChainSpecRegistry for InMemoryChainSpecRegistry {
	async fn has(&self, chain_id: &str) -> bool {
		self.specs.contains_key(chain_id)
	}

	async fn get(&self, chain_id: &str) -> Result<Option<String>, RepositoryError> {
		Ok(self.specs.get(chain_id).cloned())
	}
}

/// Registry reading `<dir>/<chain_id>.json`
#[derive(Debug, Clone)]
pub struct DirectoryChainSpecRegistry {
	dir: PathBuf,
}

impl DirectoryChainSpecRegistry {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the spec file; `None` for ids that are not plain file stems
	fn spec_path(&self, chain_id: &str) -> Option<PathBuf> {
		let plain = !chain_id.is_empty()
			&& chain_id
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
		plain.then(|| self.dir.join(format!("{}.json", chain_id)))
	}
}

#[async_trait]
impl ChainSpecRegistry for DirectoryChainSpecRegistry {
	async fn has(&self, chain_id: &str) -> bool {
		let Some(path) = self.spec_path(chain_id) else {
			return false;
		};
		tokio::fs::metadata(&path)
			.await
			.is_ok_and(|metadata| metadata.is_file())
	}

	async fn get(&self, chain_id: &str) -> Result<Option<String>, RepositoryError> {
		let Some(path) = self.spec_path(chain_id) else {
			return Ok(None);
		};

		match tokio::fs::read_to_string(&path).await {
			Ok(spec) => Ok(Some(spec)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(RepositoryError::load_error(
				format!("Failed to read chain spec for '{}'", chain_id),
				Some(Box::new(e)),
				Some(HashMap::from([(
					"path".to_string(),
					path.display().to_string(),
				)])),
			)),
		}
	}
}
