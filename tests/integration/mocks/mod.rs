//! Mock implementations for testing purposes.
//!
//! - Chain spec registry: `mockall` mock of [`ChainSpecRegistry`]
//! - Transports: hand-written counting stubs of the socket connector, the light-client runtime
//!   and the raw client
//!
//! [`ChainSpecRegistry`]: substrate_connect::repositories::ChainSpecRegistry

mod repositories;

#[allow(unused_imports)]
pub use repositories::*;
#[allow(unused_imports)]
pub use transports::*;
