use serde::{Deserialize, Serialize};
use std::fmt;

/// How a connection reaches the chain.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
	/// Direct WebSocket JSON-RPC connection to a remote node
	#[default]
	Socket,
	/// Embedded light client synced from a chain specification
	LightClient,
}

impl fmt::Display for TransportMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Socket => write!(f, "socket"),
			Self::LightClient => write!(f, "light_client"),
		}
	}
}

/// Identity of a cached connection.
///
/// Two requests with the same key always resolve to the same underlying connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
	pub chain_id: String,
	pub mode: TransportMode,
}

impl ConnectionKey {
	pub fn new(chain_id: impl Into<String>, mode: TransportMode) -> Self {
		Self {
			chain_id: chain_id.into(),
			mode,
		}
	}
}

impl fmt::Display for ConnectionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.chain_id, self.mode)
	}
}

/// Liveness state of a connection as seen by the reconnection supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Connected,
	/// `attempt` is 1-based and counts the reconnect attempt in progress
	Reconnecting {
		attempt: u32,
	},
	/// Reconnection gave up; terminal
	Failed,
	/// Torn down by the lifecycle manager; terminal
	Closed,
}

impl ConnectionState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Failed | Self::Closed)
	}
}
