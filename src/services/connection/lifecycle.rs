//! Connection teardown.
//!
//! [`LifecycleManager::disconnect`] runs every teardown step exactly once per connection, no
//! matter how many callers ask for it concurrently; later callers observe the same outcome.

use std::{collections::HashMap, sync::Arc};

use crate::{
	models::ConnectionState,
	services::connection::{Connection, ConnectionCache, ConnectionError, LightClientChainLoader},
};

/// Coordinates connection teardown
#[derive(Clone)]
pub struct LifecycleManager {
	cache: ConnectionCache,
	loader: Option<Arc<LightClientChainLoader>>,
}

impl LifecycleManager {
	pub fn new(cache: ConnectionCache, loader: Option<Arc<LightClientChainLoader>>) -> Self {
		Self { cache, loader }
	}

	/// Tears `connection` down; idempotent
	///
	/// Each step is attempted even when an earlier one failed:
	/// 1. cancel readiness tracking
	/// 2. stop the reconnection supervisor
	/// 3. destroy the raw client
	/// 4. evict the cache entry
	/// 5. release light-client chains, parachain before relay
	///
	/// Failures are reported together as [`ConnectionError::DisconnectFailure`].
	pub async fn disconnect(&self, connection: &Arc<Connection>) -> Result<(), ConnectionError> {
		connection
			.teardown
			.get_or_init(|| self.teardown(connection))
			.await
			.clone()
	}

	async fn teardown(&self, connection: &Arc<Connection>) -> Result<(), ConnectionError> {
		let mut failures: Vec<String> = Vec::new();
		tracing::info!(connection = %connection.key(), id = %connection.id(), "Disconnecting");
		connection.begin_close();

		connection.readiness().cancel();

		if let Some(supervisor) = connection.take_supervisor() {
			supervisor.abort();
		}

		let client = connection.client().await;
		if let Err(e) = client.destroy().await {
			tracing::warn!(connection = %connection.key(), error = %e, "Failed to destroy client");
			failures.push(format!("destroy {}: {}", client.endpoint(), e));
		}

		self.cache
			.evict_connection(connection.key(), connection.id())
			.await;

		let chains = connection.take_light_chains().await;
		if let Some(loader) = &self.loader {
			for handle in chains.iter().rev() {
				if let Err(e) = loader.release(handle).await {
					tracing::warn!(chain = %handle.chain_id(), error = %e, "Failed to release light client chain");
					failures.push(format!("release {}: {}", handle.chain_id(), e));
				}
			}
		}

		connection.set_state(ConnectionState::Closed);

		if failures.is_empty() {
			tracing::info!(connection = %connection.key(), "Disconnected");
			Ok(())
		} else {
			Err(ConnectionError::disconnect_failure(
				format!(
					"{} teardown step(s) failed for '{}'",
					failures.len(),
					connection.key()
				),
				None,
				Some(HashMap::from([
					("chain_id".to_string(), connection.chain_id().to_string()),
					("failures".to_string(), failures.join("; ")),
				])),
			))
		}
	}
}
