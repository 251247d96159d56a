//! Error types for chain transports
//!
//! Covers socket handshakes, best-block streams, JSON-RPC requests and the embedded
//! light-client runtime.

use crate::utils::logging::error::{BoxedSource, ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
	/// Opening the connection failed
	#[error("Handshake failed: {0}")]
	Handshake(ErrorContext),

	/// The underlying stream or socket went away
	#[error("Stream closed: {0}")]
	StreamClosed(ErrorContext),

	/// The node reported that the followed chain head is no longer consistent
	#[error("Chain head desynchronized: {0}")]
	ChainHeadDesync(ErrorContext),

	/// A JSON-RPC request or subscription was rejected
	#[error("Request failed: {0}")]
	Request(ErrorContext),

	/// The embedded light-client runtime refused an operation
	#[error("Light client error: {0}")]
	LightClient(ErrorContext),
}

impl TransportError {
	pub fn handshake(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Handshake(ErrorContext::new(msg, source, metadata))
	}

	pub fn stream_closed(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StreamClosed(ErrorContext::new(msg, source, metadata))
	}

	pub fn chain_head_desync(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ChainHeadDesync(ErrorContext::new(msg, source, metadata))
	}

	pub fn request(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Request(ErrorContext::new(msg, source, metadata))
	}

	pub fn light_client(
		msg: impl Into<String>,
		source: Option<BoxedSource>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::LightClient(ErrorContext::new_with_log(msg, source, metadata))
	}

	/// Error variants that mean the connection itself is gone
	pub fn is_disconnect(&self) -> bool {
		matches!(self, Self::StreamClosed(_) | Self::ChainHeadDesync(_))
	}

	pub fn context(&self) -> &ErrorContext {
		match self {
			Self::Handshake(ctx)
			| Self::StreamClosed(ctx)
			| Self::ChainHeadDesync(ctx)
			| Self::Request(ctx)
			| Self::LightClient(ctx) => ctx,
		}
	}
}

impl TraceableError for TransportError {
	fn trace_id(&self) -> String {
		self.context().trace_id.clone()
	}
}
