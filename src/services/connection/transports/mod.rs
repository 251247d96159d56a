//! Transport abstractions and implementations.
//!
//! The connection manager only needs four things from a transport library: connect by URL,
//! connect to a chain loaded into a light client, subscribe to best blocks and destroy a
//! client. These are modelled as the [`SocketConnector`], [`LightClientRuntime`] and
//! [`RawClient`] traits.
//!
//! - `ws`: WebSocket JSON-RPC transport built on `jsonrpsee`
//! - `smoldot`: embedded `smoldot-light` runtime (requires the `smoldot` feature)

mod error;
mod ws;

#[cfg(feature = "smoldot")]
mod smoldot;

pub use error::TransportError;
pub use ws::{WsClient, WsConnector};

#[cfg(feature = "smoldot")]
pub use smoldot::SmoldotRuntime;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;

/// Best-block notification delivered by a [`BlockSubscription`]
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNotification {
	/// Block number, when the header could be decoded
	pub number: Option<u64>,
	/// Raw header as received from the node
	pub header: Value,
}

impl BlockNotification {
	/// Builds a notification from a JSON header (`number` is a hex string on Substrate nodes)
	pub fn from_header(header: Value) -> Self {
		let number = header
			.get("number")
			.and_then(|n| match n {
				Value::String(s) => u64::from_str_radix(s.trim_start_matches("0x"), 16).ok(),
				Value::Number(n) => n.as_u64(),
				_ => None,
			});
		Self { number, header }
	}
}

/// Stream of best-block notifications; dropping it cancels the subscription
pub type BlockSubscription = BoxStream<'static, Result<BlockNotification, TransportError>>;

/// A live client able to talk to one chain
#[async_trait]
pub trait RawClient: Send + Sync {
	/// Human readable identification of the remote side (URL or light-client chain)
	fn endpoint(&self) -> String;

	/// Subscribes to new best blocks
	async fn subscribe_best_blocks(&self) -> Result<BlockSubscription, TransportError>;

	/// Hash of the latest finalized block; used as a liveness probe
	async fn finalized_block(&self) -> Result<String, TransportError>;

	/// Closes the client. Calling it more than once is allowed.
	async fn destroy(&self) -> Result<(), TransportError>;
}

/// Opens socket clients by URL
#[async_trait]
pub trait SocketConnector: Send + Sync {
	async fn connect(&self, endpoint: &str) -> Result<Arc<dyn RawClient>, TransportError>;
}

/// Opaque reference to a chain loaded into a [`LightClientRuntime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeChainRef(pub usize);

/// Embedded light-client runtime
#[async_trait]
pub trait LightClientRuntime: Send + Sync {
	/// Loads a chain from its specification. Parachains pass the reference of their relay.
	async fn add_chain(
		&self,
		chain_id: &str,
		spec: &str,
		relay: Option<NativeChainRef>,
	) -> Result<NativeChainRef, TransportError>;

	/// Opens a JSON-RPC client on a loaded chain
	async fn connect_chain(
		&self,
		chain: NativeChainRef,
	) -> Result<Arc<dyn RawClient>, TransportError>;

	/// Unloads a chain
	async fn remove_chain(&self, chain: NativeChainRef) -> Result<(), TransportError>;

	/// Stops the runtime; every loaded chain is dropped
	async fn terminate(&self) -> Result<(), TransportError>;
}
