//! Repository implementations for static chain data.
//!
//! - Chain: the table of known chains, built-in or loaded from JSON descriptors
//! - Chain spec: sources of serialized chain specifications for light clients

mod chain;
mod chain_spec;
mod error;

pub use chain::ChainRegistry;
pub use chain_spec::{ChainSpecRegistry, DirectoryChainSpecRegistry, InMemoryChainSpecRegistry};
pub use error::RepositoryError;
