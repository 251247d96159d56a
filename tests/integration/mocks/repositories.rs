//! Mock implementations of repository traits.

use async_trait::async_trait;
use mockall::mock;

use substrate_connect::repositories::{ChainSpecRegistry, RepositoryError};

mock! {
	/// Mock implementation of the chain spec registry.
	pub ChainSpecRegistry {}

	#[async_trait]
	impl ChainSpecRegistry for ChainSpecRegistry {
		async fn has(&self, chain_id: &str) -> bool;
		async fn get(&self, chain_id: &str) -> Result<Option<String>, RepositoryError>;
	}
}

/// Registry mock that knows a spec for every chain in `chains`
pub fn spec_registry_with(chains: &[&str]) -> MockChainSpecRegistry {
	let known: Vec<String> = chains.iter().map(|c| c.to_string()).collect();
	let lookup = known.clone();

	let mut registry = MockChainSpecRegistry::new();
	registry
		.expect_has()
		.returning(move |chain_id| known.iter().any(|c| c == chain_id));
	registry.expect_get().returning(move |chain_id| {
		Ok(lookup
			.iter()
			.any(|c| c == chain_id)
			.then(|| format!("{{\"id\":\"{}\"}}", chain_id)))
	});
	registry
}
