//! Connection & light-client resource management.
//!
//! - `manager`: caller-facing `acquire` / `release`
//! - `cache`: single-flight cache of connection creations
//! - `factory`: socket and light-client client creation
//! - `loader`: relay-before-parachain chain loading into the light client
//! - `readiness`: first best block detection
//! - `supervisor`: liveness probing and reconnection with exponential backoff
//! - `lifecycle`: idempotent teardown
//! - `transports`: transport traits and their implementations

mod cache;
mod connection;
mod error;
mod factory;
mod lifecycle;
mod loader;
mod manager;
mod readiness;
mod spec_resolver;
mod supervisor;

pub mod transports;

pub use cache::{ConnectionCache, ConnectionFuture, EntryState};
pub use connection::{Connection, ConnectionHandle, RawConnection};
pub use error::ConnectionError;
pub use factory::ClientFactory;
pub use lifecycle::LifecycleManager;
pub use loader::{LightClientChainHandle, LightClientChainLoader};
pub use manager::ConnectionManager;
pub use readiness::{await_ready, Readiness};
pub use spec_resolver::ChainSpecResolver;
pub use supervisor::{DisconnectClassifier, ReconnectPolicy, ReconnectionSupervisor};
pub use transports::{
	BlockNotification, BlockSubscription, LightClientRuntime, NativeChainRef, RawClient,
	SocketConnector, TransportError, WsClient, WsConnector,
};

#[cfg(feature = "smoldot")]
pub use transports::SmoldotRuntime;
