//! Test helper utilities for chain descriptors
//!
//! - `ChainDescriptorBuilder`: Builder for creating test ChainDescriptor instances

use crate::models::{ChainDescriptor, ChainKind};

/// Builder for creating test ChainDescriptor instances
pub struct ChainDescriptorBuilder {
	id: String,
	display_name: String,
	spec_name: String,
	socket_endpoints: Vec<String>,
	relay_chain_id: Option<String>,
	kind: ChainKind,
	address_prefix: u16,
	numeric_chain_id: Option<u32>,
	block_explorer_url: Option<String>,
}

impl Default for ChainDescriptorBuilder {
	fn default() -> Self {
		Self {
			id: "test_chain".to_string(),
			display_name: "Test Chain".to_string(),
			spec_name: "test-chain".to_string(),
			socket_endpoints: vec!["wss://test.chain".to_string()],
			relay_chain_id: None,
			kind: ChainKind::Relay,
			address_prefix: 42,
			numeric_chain_id: None,
			block_explorer_url: None,
		}
	}
}

impl ChainDescriptorBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Shapes the descriptor as a relay chain with the given id
	pub fn relay(mut self, id: &str) -> Self {
		self.id = id.to_string();
		self.display_name = id.to_string();
		self.kind = ChainKind::Relay;
		self.relay_chain_id = None;
		self.numeric_chain_id = None;
		self.socket_endpoints = vec![format!("wss://{}.test", id)];
		self
	}

	/// Shapes the descriptor as a system parachain of `relay`
	pub fn system_parachain(self, id: &str, relay: &str, para_id: u32) -> Self {
		self.dependent(id, relay, para_id, ChainKind::SystemParachain)
	}

	/// Shapes the descriptor as a regular parachain of `relay`
	pub fn parachain(self, id: &str, relay: &str, para_id: u32) -> Self {
		self.dependent(id, relay, para_id, ChainKind::Parachain)
	}

	fn dependent(mut self, id: &str, relay: &str, para_id: u32, kind: ChainKind) -> Self {
		self.id = id.to_string();
		self.display_name = id.to_string();
		self.kind = kind;
		self.relay_chain_id = Some(relay.to_string());
		self.numeric_chain_id = Some(para_id);
		self.socket_endpoints = vec![format!("wss://{}.test", id)];
		self
	}

	pub fn id(mut self, id: &str) -> Self {
		self.id = id.to_string();
		self
	}

	pub fn display_name(mut self, name: &str) -> Self {
		self.display_name = name.to_string();
		self
	}

	pub fn spec_name(mut self, spec_name: &str) -> Self {
		self.spec_name = spec_name.to_string();
		self
	}

	pub fn socket_endpoints(mut self, endpoints: Vec<&str>) -> Self {
		self.socket_endpoints = endpoints.into_iter().map(String::from).collect();
		self
	}

	pub fn relay_chain_id(mut self, relay: Option<&str>) -> Self {
		self.relay_chain_id = relay.map(String::from);
		self
	}

	pub fn kind(mut self, kind: ChainKind) -> Self {
		self.kind = kind;
		self
	}

	pub fn address_prefix(mut self, prefix: u16) -> Self {
		self.address_prefix = prefix;
		self
	}

	pub fn numeric_chain_id(mut self, id: Option<u32>) -> Self {
		self.numeric_chain_id = id;
		self
	}

	pub fn block_explorer_url(mut self, url: &str) -> Self {
		self.block_explorer_url = Some(url.to_string());
		self
	}

	pub fn build(self) -> ChainDescriptor {
		ChainDescriptor {
			id: self.id,
			display_name: self.display_name,
			spec_name: self.spec_name,
			socket_endpoints: self.socket_endpoints,
			relay_chain_id: self.relay_chain_id,
			kind: self.kind,
			address_prefix: self.address_prefix,
			numeric_chain_id: self.numeric_chain_id,
			block_explorer_url: self.block_explorer_url,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_chain() {
		let chain = ChainDescriptorBuilder::new().build();

		assert_eq!(chain.id, "test_chain");
		assert_eq!(chain.kind, ChainKind::Relay);
		assert_eq!(chain.socket_endpoints, vec!["wss://test.chain".to_string()]);
		assert_eq!(chain.relay_chain_id, None);
		assert_eq!(chain.address_prefix, 42);
	}

	#[test]
	fn test_parachain_shape() {
		let chain = ChainDescriptorBuilder::new()
			.parachain("moonbeam", "polkadot", 2004)
			.address_prefix(1284)
			.build();

		assert_eq!(chain.kind, ChainKind::Parachain);
		assert_eq!(chain.relay_chain_id.as_deref(), Some("polkadot"));
		assert_eq!(chain.numeric_chain_id, Some(2004));
		assert_eq!(chain.socket_endpoints, vec!["wss://moonbeam.test".to_string()]);
		assert_eq!(chain.address_prefix, 1284);
	}
}
