//! Connection manager.
//!
//! Entry point of the crate. The manager owns the connection cache, the light-client loader and
//! the supervisor, and exposes `acquire` / `release` to callers. Construction performs no I/O;
//! network activity starts with the first `acquire`.

use std::{collections::HashMap, sync::Arc};

use crate::{
	models::{AcquireOptions, ConnectionKey, ManagerConfig},
	repositories::{ChainRegistry, ChainSpecRegistry},
	services::connection::{
		transports::{LightClientRuntime, SocketConnector},
		ChainSpecResolver, ClientFactory, Connection, ConnectionCache, ConnectionError,
		ConnectionHandle, LifecycleManager, LightClientChainLoader, ReconnectionSupervisor,
	},
};

/// Shares, supervises and tears down chain connections
pub struct ConnectionManager {
	config: ManagerConfig,
	registry: Arc<ChainRegistry>,
	resolver: Arc<ChainSpecResolver>,
	factory: Arc<ClientFactory>,
	cache: ConnectionCache,
	loader: Option<Arc<LightClientChainLoader>>,
	supervisor: Arc<ReconnectionSupervisor>,
	lifecycle: LifecycleManager,
}

impl ConnectionManager {
	/// Wires the manager; cheap and synchronous
	///
	/// # Arguments
	/// * `config` - Manager options
	/// * `registry` - Known chains
	/// * `spec_registry` - Source of chain specifications for the light client
	/// * `socket` - Opens WebSocket clients
	/// * `light_runtime` - Embedded light client, when one is available
	pub fn new(
		config: ManagerConfig,
		registry: Arc<ChainRegistry>,
		spec_registry: Arc<dyn ChainSpecRegistry>,
		socket: Arc<dyn SocketConnector>,
		light_runtime: Option<Arc<dyn LightClientRuntime>>,
	) -> Self {
		let resolver = Arc::new(ChainSpecResolver::new(spec_registry));
		let loader = light_runtime.map(|runtime| Arc::new(LightClientChainLoader::new(runtime)));
		let cache = ConnectionCache::new();
		let factory = Arc::new(ClientFactory::new(
			registry.clone(),
			resolver.clone(),
			socket,
			loader.clone(),
			config.light_client_enabled,
		));
		let supervisor = Arc::new(ReconnectionSupervisor::new(
			factory.clone(),
			cache.clone(),
			loader.clone(),
			&config,
		));
		let lifecycle = LifecycleManager::new(cache.clone(), loader.clone());

		Self {
			config,
			registry,
			resolver,
			factory,
			cache,
			loader,
			supervisor,
			lifecycle,
		}
	}

	/// Returns a ready connection to `chain_id`, creating it on first use
	///
	/// Concurrent calls for the same chain and transport share one connection. Unless
	/// [`AcquireOptions::skip_ready`] is set the call waits for the first best block; a
	/// connection that fails readiness is torn down before the error is returned.
	///
	/// The wait is bounded by the caller's timeout and by the one of the caller that created the
	/// connection, whichever is shorter. Running out of one's own shorter timeout leaves the
	/// shared connection alone.
	pub async fn acquire(
		&self,
		chain_id: &str,
		options: AcquireOptions,
	) -> Result<ConnectionHandle, ConnectionError> {
		let descriptor = self.registry.lookup_by_id(chain_id)?.clone();
		let mode = options.mode.unwrap_or(self.config.transport_mode);
		let key = ConnectionKey::new(descriptor.id.clone(), mode);
		let ready_timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

		let factory = self.factory.clone();
		let supervisor = self.supervisor.clone();
		let creation_key = key.clone();
		let future = self
			.cache
			.get_or_create(key.clone(), move || async move {
				let raw = factory.create(&descriptor, mode).await?;
				let connection = Connection::new(creation_key, descriptor, raw, ready_timeout);
				connection.set_supervisor(supervisor.watch(&connection));
				Ok::<_, ConnectionError>(connection)
			})
			.await;

		let connection = future.await?;
		if options.skip_ready {
			return Ok(connection);
		}

		// A caller with a shorter timeout than the creator gives up alone
		let ready = if ready_timeout < connection.ready_timeout() {
			match tokio::time::timeout(ready_timeout, connection.ready()).await {
				Ok(outcome) => outcome,
				Err(_) => {
					return Err(ConnectionError::connection_timeout(
						format!(
							"Connection not ready within {}ms",
							ready_timeout.as_millis()
						),
						None,
						Some(HashMap::from([(
							"chain_id".to_string(),
							connection.chain_id().to_string(),
						)])),
					));
				}
			}
		} else {
			connection.ready().await
		};

		if let Err(e) = ready {
			tracing::warn!(connection = %key, error = %e, "Connection did not become ready");
			if let Err(teardown) = self.lifecycle.disconnect(&connection).await {
				tracing::warn!(connection = %key, error = %teardown, "Teardown after failed readiness failed");
			}
			return Err(e);
		}
		Ok(connection)
	}

	/// Gives a connection back; never fails
	///
	/// Connections are shared between callers with the same key, so releasing tears the shared
	/// connection down for everyone. Teardown failures are logged.
	pub async fn release(&self, handle: ConnectionHandle) {
		if let Err(e) = self.lifecycle.disconnect(&handle).await {
			tracing::warn!(connection = %handle.key(), error = %e, "Release completed with failures");
		}
	}

	/// Tears down one connection and reports failures
	pub async fn disconnect(&self, connection: &ConnectionHandle) -> Result<(), ConnectionError> {
		self.lifecycle.disconnect(connection).await
	}

	/// Tears down every cached connection and terminates the light-client runtime
	pub async fn shutdown(&self) -> Result<(), ConnectionError> {
		let pending = self.cache.drain().await;
		tracing::info!(connections = pending.len(), "Shutting down connection manager");

		let mut failures = Vec::new();
		for creation in pending {
			// Failed creations hold no resources
			let Ok(connection) = creation.await else {
				continue;
			};
			if let Err(e) = self.lifecycle.disconnect(&connection).await {
				failures.push(e.to_string());
			}
		}

		if let Some(loader) = &self.loader {
			if let Err(e) = loader.shutdown().await {
				failures.push(e.to_string());
			}
		}
		self.resolver.clear_cache().await;

		if failures.is_empty() {
			Ok(())
		} else {
			Err(ConnectionError::disconnect_failure(
				format!("{} failure(s) during shutdown", failures.len()),
				None,
				Some(HashMap::from([(
					"failures".to_string(),
					failures.join("; "),
				)])),
			))
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	pub fn registry(&self) -> &Arc<ChainRegistry> {
		&self.registry
	}

	pub fn cache(&self) -> &ConnectionCache {
		&self.cache
	}

	pub fn loader(&self) -> Option<&Arc<LightClientChainLoader>> {
		self.loader.as_ref()
	}

	pub async fn connection_count(&self) -> usize {
		self.cache.len().await
	}
}
