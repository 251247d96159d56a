//! Raw client creation.
//!
//! The [`ClientFactory`] turns a chain descriptor and a transport mode into a
//! [`RawConnection`]. Light-client mode silently falls back to sockets whenever the chain
//! cannot be served by the embedded runtime.

use std::{collections::HashMap, sync::Arc};

use crate::{
	models::{ChainDescriptor, TransportMode},
	repositories::ChainRegistry,
	services::connection::{
		connection::RawConnection,
		loader::{LightClientChainHandle, LightClientChainLoader},
		transports::SocketConnector,
		ChainSpecResolver, ConnectionError,
	},
};

/// Produces raw clients for the connection manager
pub struct ClientFactory {
	registry: Arc<ChainRegistry>,
	resolver: Arc<ChainSpecResolver>,
	socket: Arc<dyn SocketConnector>,
	loader: Option<Arc<LightClientChainLoader>>,
	light_client_enabled: bool,
}

impl ClientFactory {
	pub fn new(
		registry: Arc<ChainRegistry>,
		resolver: Arc<ChainSpecResolver>,
		socket: Arc<dyn SocketConnector>,
		loader: Option<Arc<LightClientChainLoader>>,
		light_client_enabled: bool,
	) -> Self {
		Self {
			registry,
			resolver,
			socket,
			loader,
			light_client_enabled,
		}
	}

	/// Creates a raw connection to `descriptor` using `mode`
	pub async fn create(
		&self,
		descriptor: &ChainDescriptor,
		mode: TransportMode,
	) -> Result<RawConnection, ConnectionError> {
		if mode == TransportMode::LightClient {
			if let Some(loader) = self.light_client_loader(descriptor).await {
				match self.create_light_client(loader, descriptor).await {
					Err(ConnectionError::ChainSpecMissing(ctx)) => {
						tracing::info!(
							chain = %descriptor.id,
							reason = %ctx.message,
							"Chain spec unavailable, falling back to socket transport"
						);
					}
					outcome => return outcome,
				}
			}
		}
		self.create_socket(descriptor).await
	}

	/// Loader to use when the light client can serve `descriptor`
	async fn light_client_loader(
		&self,
		descriptor: &ChainDescriptor,
	) -> Option<&Arc<LightClientChainLoader>> {
		let Some(loader) = self.loader.as_ref().filter(|_| self.light_client_enabled) else {
			tracing::info!(chain = %descriptor.id, "Light client unavailable, using socket transport");
			return None;
		};

		let mut required = vec![descriptor.id.as_str()];
		if descriptor.is_parachain() {
			if let Some(relay) = descriptor.relay_chain_id.as_deref() {
				required.push(relay);
			}
		}
		for chain_id in required {
			if !self.resolver.has(chain_id).await {
				tracing::info!(
					chain = %descriptor.id,
					missing = %chain_id,
					"No chain spec available, using socket transport"
				);
				return None;
			}
		}
		Some(loader)
	}

	/// Tries every socket endpoint in order; the first successful handshake wins
	pub async fn create_socket(
		&self,
		descriptor: &ChainDescriptor,
	) -> Result<RawConnection, ConnectionError> {
		let mut failures = Vec::new();

		for endpoint in &descriptor.socket_endpoints {
			match self.socket.connect(endpoint).await {
				Ok(client) => {
					tracing::debug!(chain = %descriptor.id, endpoint = %endpoint, "Socket handshake succeeded");
					return Ok(RawConnection {
						client,
						light_chains: Vec::new(),
					});
				}
				Err(e) => {
					tracing::warn!(
						chain = %descriptor.id,
						endpoint = %endpoint,
						error = %e,
						"Endpoint unreachable, trying next"
					);
					failures.push(format!("{}: {}", endpoint, e));
				}
			}
		}

		Err(ConnectionError::all_endpoints_unreachable(
			format!(
				"None of the {} endpoints of '{}' accepted a connection",
				descriptor.socket_endpoints.len(),
				descriptor.id
			),
			None,
			Some(HashMap::from([
				("chain_id".to_string(), descriptor.id.clone()),
				("failures".to_string(), failures.join("; ")),
			])),
		))
	}

	async fn create_light_client(
		&self,
		loader: &Arc<LightClientChainLoader>,
		descriptor: &ChainDescriptor,
	) -> Result<RawConnection, ConnectionError> {
		let mut loaded: Vec<Arc<LightClientChainHandle>> = Vec::new();

		let client = match self.load_chains(loader, descriptor, &mut loaded).await {
			Ok(handle) => loader.connect(&handle).await,
			Err(e) => Err(e),
		};

		match client {
			Ok(client) => Ok(RawConnection {
				client,
				light_chains: loaded,
			}),
			Err(e) => {
				for handle in loaded.iter().rev() {
					if let Err(release_error) = loader.release(handle).await {
						tracing::warn!(
							chain = %handle.chain_id(),
							error = %release_error,
							"Failed to release light client chain"
						);
					}
				}
				Err(e)
			}
		}
	}

	/// Loads the relay chain (for parachains) and then the chain itself
	///
	/// Every handle obtained is pushed to `loaded` so the caller can release it.
	async fn load_chains(
		&self,
		loader: &LightClientChainLoader,
		descriptor: &ChainDescriptor,
		loaded: &mut Vec<Arc<LightClientChainHandle>>,
	) -> Result<Arc<LightClientChainHandle>, ConnectionError> {
		let relay = if descriptor.is_parachain() {
			let relay = self.registry.relay_of(descriptor)?;
			let spec = self.resolver.resolve(&relay.id).await?;
			let handle = loader.load(relay, &spec, None).await?;
			loaded.push(handle.clone());
			Some(handle)
		} else {
			None
		};

		let spec = self.resolver.resolve(&descriptor.id).await?;
		let handle = loader.load(descriptor, &spec, relay).await?;
		loaded.push(handle.clone());
		Ok(handle)
	}
}
