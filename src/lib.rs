//! Connection and light-client resource manager for Substrate chains.
//!
//! This library hands out ready-to-use connections to the RPC interface of Substrate and
//! Polkadot chains. It includes:
//!
//! - Transparent choice between a WebSocket connection and an embedded light client
//! - Connection sharing across concurrent callers
//! - Relay-before-parachain loading of light-client chains
//! - Liveness probing with exponential-backoff reconnection
//! - Idempotent teardown
//!
//! # Module Structure
//!
//! - `bootstrap`: Wires the connection manager from configuration
//! - `models`: Chain descriptors, connection keys and configuration
//! - `repositories`: Chain registry and chain spec sources
//! - `services`: Connection management and transports
//! - `utils`: Logging and test helpers

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
