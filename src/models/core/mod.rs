mod chain;
mod connection;

pub use chain::{ChainDescriptor, ChainKind};
pub use connection::{ConnectionKey, ConnectionState, TransportMode};
