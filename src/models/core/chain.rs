use serde::{Deserialize, Serialize};

/// Position of a chain in the relay/parachain topology.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
	/// Base chain providing shared security to its parachains
	Relay,
	/// Parachain operated by the relay chain itself (asset hub, bridge hub, ...)
	SystemParachain,
	/// Regular parachain
	Parachain,
}

/// Static description of a known chain.
///
/// Descriptors are created once when the [`ChainRegistry`](crate::repositories::ChainRegistry)
/// is built and never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChainDescriptor {
	/// Unique identifier of the chain (e.g. `polkadot_asset_hub`)
	pub id: String,

	/// Human-readable name of the chain
	pub display_name: String,

	/// Runtime spec name reported by the chain
	#[serde(default)]
	pub spec_name: String,

	/// WebSocket RPC endpoints, tried in listed order
	pub socket_endpoints: Vec<String>,

	/// Identifier of the relay chain this chain depends on
	#[serde(default)]
	pub relay_chain_id: Option<String>,

	/// Topology kind
	pub kind: ChainKind,

	/// SS58 address prefix
	pub address_prefix: u16,

	/// Parachain id assigned by the relay chain
	#[serde(default)]
	pub numeric_chain_id: Option<u32>,

	/// Block explorer base URL
	#[serde(default)]
	pub block_explorer_url: Option<String>,
}

impl ChainDescriptor {
	/// Returns true when the chain is a relay chain.
	pub fn is_relay(&self) -> bool {
		self.kind == ChainKind::Relay
	}

	/// Returns true when the chain depends on a relay chain (system or regular parachain).
	pub fn is_parachain(&self) -> bool {
		matches!(self.kind, ChainKind::SystemParachain | ChainKind::Parachain)
	}

	/// Returns true for system parachains.
	pub fn is_system_chain(&self) -> bool {
		self.kind == ChainKind::SystemParachain
	}
}
