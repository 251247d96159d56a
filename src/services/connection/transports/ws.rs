//! WebSocket JSON-RPC transport.
//!
//! Uses the legacy `chain_*` RPC namespace that every Substrate node serves: best blocks come
//! from `chain_subscribeNewHeads`, the liveness probe is `chain_getFinalizedHead`.

use async_trait::async_trait;
use futures::StreamExt;
use jsonrpsee::{
	core::client::{ClientT, Error as ClientError, SubscriptionClientT},
	rpc_params,
	ws_client::{WsClient as JsonRpcClient, WsClientBuilder},
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;

use super::{BlockNotification, BlockSubscription, RawClient, SocketConnector, TransportError};

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn endpoint_metadata(endpoint: &str) -> Option<HashMap<String, String>> {
	Some(HashMap::from([(
		"endpoint".to_string(),
		endpoint.to_string(),
	)]))
}

/// Maps a `jsonrpsee` error; a lost background connection is a disconnect
fn map_client_error(endpoint: &str, method: &str, error: ClientError) -> TransportError {
	match error {
		ClientError::RestartNeeded(_) => TransportError::stream_closed(
			format!("Connection closed while calling {}", method),
			Some(Box::new(error)),
			endpoint_metadata(endpoint),
		),
		other => TransportError::request(
			format!("{} failed: {}", method, other),
			Some(Box::new(other)),
			endpoint_metadata(endpoint),
		),
	}
}

/// Opens [`WsClient`]s
#[derive(Debug, Clone)]
pub struct WsConnector {
	connection_timeout: Duration,
	request_timeout: Duration,
}

impl Default for WsConnector {
	fn default() -> Self {
		Self {
			connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

impl WsConnector {
	pub fn new(connection_timeout: Duration, request_timeout: Duration) -> Self {
		Self {
			connection_timeout,
			request_timeout,
		}
	}
}

#[async_trait]
impl SocketConnector for WsConnector {
	async fn connect(&self, endpoint: &str) -> Result<Arc<dyn RawClient>, TransportError> {
		tracing::debug!(endpoint = %endpoint, "Opening websocket client");

		let client = WsClientBuilder::default()
			.connection_timeout(self.connection_timeout)
			.request_timeout(self.request_timeout)
			.build(endpoint)
			.await
			.map_err(|e| {
				TransportError::handshake(
					format!("Failed to connect: {}", e),
					Some(Box::new(e)),
					endpoint_metadata(endpoint),
				)
			})?;

		Ok(Arc::new(WsClient::new(endpoint, client)))
	}
}

/// WebSocket JSON-RPC client for one endpoint
pub struct WsClient {
	endpoint: String,
	inner: RwLock<Option<Arc<JsonRpcClient>>>,
}

impl WsClient {
	fn new(endpoint: &str, client: JsonRpcClient) -> Self {
		Self {
			endpoint: endpoint.to_string(),
			inner: RwLock::new(Some(Arc::new(client))),
		}
	}

	async fn active(&self) -> Result<Arc<JsonRpcClient>, TransportError> {
		match self.inner.read().await.as_ref() {
			Some(client) if client.is_connected() => Ok(client.clone()),
			Some(_) => Err(TransportError::stream_closed(
				"Connection closed by the remote endpoint",
				None,
				endpoint_metadata(&self.endpoint),
			)),
			None => Err(TransportError::stream_closed(
				"Connection closed: client was destroyed",
				None,
				endpoint_metadata(&self.endpoint),
			)),
		}
	}
}

#[async_trait]
impl RawClient for WsClient {
	fn endpoint(&self) -> String {
		self.endpoint.clone()
	}

	async fn subscribe_best_blocks(&self) -> Result<BlockSubscription, TransportError> {
		let client = self.active().await?;
		let endpoint = self.endpoint.clone();

		let subscription = client
			.subscribe::<Value, _>(
				"chain_subscribeNewHeads",
				rpc_params![],
				"chain_unsubscribeNewHeads",
			)
			.await
			.map_err(|e| map_client_error(&self.endpoint, "chain_subscribeNewHeads", e))?;

		Ok(subscription
			.map(move |item| {
				item.map(BlockNotification::from_header).map_err(|e| {
					TransportError::request(
						format!("Malformed header notification: {}", e),
						Some(Box::new(e)),
						endpoint_metadata(&endpoint),
					)
				})
			})
			.boxed())
	}

	async fn finalized_block(&self) -> Result<String, TransportError> {
		let client = self.active().await?;
		client
			.request::<String, _>("chain_getFinalizedHead", rpc_params![])
			.await
			.map_err(|e| map_client_error(&self.endpoint, "chain_getFinalizedHead", e))
	}

	async fn destroy(&self) -> Result<(), TransportError> {
		// Dropping the last reference stops the background task and closes the socket
		if self.inner.write().await.take().is_some() {
			tracing::debug!(endpoint = %self.endpoint, "Websocket client destroyed");
		}
		Ok(())
	}
}
