//! Connection manager error types.
//!
//! Errors produced while creating a connection are shared by every caller waiting on the same
//! cache entry, so [`ConnectionError`] is `Clone`.

use crate::{
	services::connection::transports::TransportError,
	utils::logging::error::{BoxedSource, ErrorContext, TraceableError},
};
use std::collections::HashMap;
use thiserror::Error as ThisError;

/// Represents errors that can occur while acquiring, supervising or tearing down connections
#[derive(ThisError, Debug, Clone)]
pub enum ConnectionError {
	/// The chain id is not in the registry
	#[error("Chain not found: {0}")]
	ChainNotFound(ErrorContext),

	/// No chain specification exists for the chain; triggers socket fallback
	#[error("Chain spec missing: {0}")]
	ChainSpecMissing(ErrorContext),

	/// A parachain was loaded before its relay chain
	#[error("Relay chain not loaded: {0}")]
	RelayChainNotLoaded(ErrorContext),

	/// Every socket endpoint of the chain refused the handshake
	#[error("All endpoints unreachable: {0}")]
	AllEndpointsUnreachable(ErrorContext),

	/// The connection did not prove liveness in time
	#[error("Connection timeout: {0}")]
	ConnectionTimeout(ErrorContext),

	/// The reconnection supervisor gave up
	#[error("Max reconnect attempts exceeded: {0}")]
	MaxReconnectAttemptsExceeded(ErrorContext),

	/// One or more teardown steps failed
	#[error("Disconnect failure: {0}")]
	DisconnectFailure(ErrorContext),

	/// The connection was torn down while an operation was waiting on it
	#[error("Connection closed: {0}")]
	Closed(ErrorContext),

	/// Transport failure that does not fit the categories above
	#[error(transparent)]
	Transport(#[from] TransportError),
}

impl ConnectionError {
	pub fn chain_not_found(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ChainNotFound(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn chain_spec_missing(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ChainSpecMissing(ErrorContext::new(msg, source, metadata))
	}

	pub fn relay_chain_not_loaded(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::RelayChainNotLoaded(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn all_endpoints_unreachable(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::AllEndpointsUnreachable(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn connection_timeout(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConnectionTimeout(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn max_reconnect_attempts_exceeded(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::MaxReconnectAttemptsExceeded(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn disconnect_failure(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DisconnectFailure(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn closed(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Closed(ErrorContext::new(msg, source, metadata))
	}

	/// Errors the reconnection supervisor may retry after an initial success
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::AllEndpointsUnreachable(_) | Self::ConnectionTimeout(_) => true,
			Self::Transport(e) => e.is_disconnect(),
			_ => false,
		}
	}
}

impl TraceableError for ConnectionError {
	fn trace_id(&self) -> String {
		match self {
			Self::ChainNotFound(ctx)
			| Self::ChainSpecMissing(ctx)
			| Self::RelayChainNotLoaded(ctx)
			| Self::AllEndpointsUnreachable(ctx)
			| Self::ConnectionTimeout(ctx)
			| Self::MaxReconnectAttemptsExceeded(ctx)
			| Self::DisconnectFailure(ctx)
			| Self::Closed(ctx) => ctx.trace_id.clone(),
			Self::Transport(e) => e.trace_id(),
		}
	}
}
