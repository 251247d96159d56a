//! Reconnection supervisor.
//!
//! Every live connection is watched by a probe task that periodically asks for the latest
//! finalized block. A disconnect-class failure starts the reconnect loop: the client factory is
//! re-run after an exponentially growing delay until a new client passes readiness or the
//! attempts are exhausted, in which case the connection is marked failed and evicted.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::{
	collections::HashMap,
	sync::{Arc, Weak},
	time::Duration,
};
use tokio::{task::AbortHandle, time::MissedTickBehavior};

use crate::{
	models::{ConnectionState, ManagerConfig},
	services::connection::{
		await_ready,
		connection::RawConnection,
		transports::TransportError,
		ClientFactory, Connection, ConnectionCache, ConnectionError, LightClientChainHandle,
		LightClientChainLoader,
	},
};

/// Decides which failures count as a lost connection
#[derive(Debug, Clone)]
pub struct DisconnectClassifier {
	markers: Vec<String>,
}

impl DisconnectClassifier {
	pub fn new(markers: Vec<String>) -> Self {
		Self { markers }
	}

	/// True for closed streams, chain-head desyncs and errors carrying one of the markers
	pub fn is_disconnect(&self, error: &TransportError) -> bool {
		if error.is_disconnect() {
			return true;
		}
		let message = error.to_string();
		self.markers
			.iter()
			.any(|marker| message.contains(marker.as_str()))
	}

	/// Whether a failed reconnect attempt may be retried
	pub fn is_retryable(&self, error: &ConnectionError) -> bool {
		match error {
			ConnectionError::Transport(e) => self.is_disconnect(e),
			other => other.is_retryable(),
		}
	}
}

impl Default for DisconnectClassifier {
	fn default() -> Self {
		Self::new(crate::models::default_disconnect_markers())
	}
}

/// Exponential reconnect schedule: `base * 2^attempt` for `max_attempts` attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub base: Duration,
	pub max_attempts: u32,
}

impl ReconnectPolicy {
	pub fn new(base: Duration, max_attempts: u32) -> Self {
		Self { base, max_attempts }
	}

	pub fn from_config(config: &ManagerConfig) -> Self {
		Self::new(config.base_backoff(), config.max_reconnect_attempts)
	}

	/// Delay before each attempt, in order
	pub fn delays(&self) -> impl Iterator<Item = Duration> {
		let ceiling = self
			.base
			.saturating_mul(2u32.saturating_pow(self.max_attempts.saturating_sub(1)));
		ExponentialBuilder::default()
			.with_min_delay(self.base)
			.with_max_delay(ceiling)
			.with_factor(2.0)
			.with_max_times(self.max_attempts as usize)
			.build()
			.take(self.max_attempts as usize)
	}
}

/// Watches connections and reconnects them after disconnects
pub struct ReconnectionSupervisor {
	factory: Arc<ClientFactory>,
	cache: ConnectionCache,
	loader: Option<Arc<LightClientChainLoader>>,
	policy: ReconnectPolicy,
	classifier: DisconnectClassifier,
	probe_interval: Duration,
	ready_timeout: Duration,
}

impl ReconnectionSupervisor {
	pub fn new(
		factory: Arc<ClientFactory>,
		cache: ConnectionCache,
		loader: Option<Arc<LightClientChainLoader>>,
		config: &ManagerConfig,
	) -> Self {
		Self {
			factory,
			cache,
			loader,
			policy: ReconnectPolicy::from_config(config),
			classifier: DisconnectClassifier::new(config.disconnect_markers.clone()),
			probe_interval: config.probe_interval(),
			ready_timeout: config.timeout(),
		}
	}

	pub fn policy(&self) -> ReconnectPolicy {
		self.policy
	}

	/// Starts the probe task of `connection`
	///
	/// The task only holds a weak reference and ends on its own once the connection is dropped,
	/// closed or failed.
	pub fn watch(self: &Arc<Self>, connection: &Arc<Connection>) -> AbortHandle {
		let supervisor = self.clone();
		let connection = Arc::downgrade(connection);
		tokio::spawn(async move { supervisor.probe_loop(connection).await }).abort_handle()
	}

	async fn probe_loop(&self, connection: Weak<Connection>) {
		let mut interval = tokio::time::interval(self.probe_interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		// The first tick completes immediately
		interval.tick().await;

		loop {
			interval.tick().await;
			let Some(connection) = connection.upgrade() else {
				return;
			};
			if connection.is_closed() || connection.state().is_terminal() {
				return;
			}

			let client = connection.client().await;
			match client.finalized_block().await {
				Ok(_) => {
					tracing::trace!(connection = %connection.key(), "Liveness probe succeeded");
				}
				Err(e) if self.classifier.is_disconnect(&e) => {
					tracing::warn!(
						connection = %connection.key(),
						error = %e,
						"Connection lost, reconnecting"
					);
					if self.reconnect(&connection, e.into()).await.is_err() {
						return;
					}
					interval.reset();
				}
				Err(e) => {
					tracing::warn!(
						connection = %connection.key(),
						error = %e,
						"Liveness probe failed"
					);
				}
			}
		}
	}

	/// Runs the reconnect loop for `connection`
	///
	/// On success the new raw client has replaced the old one. On failure the connection is
	/// marked [`ConnectionState::Failed`] and evicted from the cache.
	pub async fn reconnect(
		&self,
		connection: &Arc<Connection>,
		cause: ConnectionError,
	) -> Result<(), ConnectionError> {
		let mut last_error = cause;

		for (index, delay) in self.policy.delays().enumerate() {
			let attempt = index as u32 + 1;
			connection.set_state(ConnectionState::Reconnecting { attempt });
			tracing::info!(
				connection = %connection.key(),
				attempt,
				delay_ms = delay.as_millis() as u64,
				"Scheduling reconnect attempt"
			);
			tokio::time::sleep(delay).await;

			if connection.is_closed() {
				return Err(closed_while_reconnecting());
			}

			match self.attempt(connection).await {
				Ok(()) => {
					connection.set_state(ConnectionState::Connected);
					tracing::info!(connection = %connection.key(), attempt, "Reconnected");
					return Ok(());
				}
				Err(e) if connection.is_closed() => return Err(e),
				Err(e) if self.classifier.is_retryable(&e) => {
					tracing::warn!(
						connection = %connection.key(),
						attempt,
						error = %e,
						"Reconnect attempt failed"
					);
					last_error = e;
				}
				Err(e) => {
					tracing::warn!(
						connection = %connection.key(),
						attempt,
						error = %e,
						"Reconnect attempt failed permanently"
					);
					self.fail(connection).await;
					return Err(e);
				}
			}
		}

		let error = ConnectionError::max_reconnect_attempts_exceeded(
			format!(
				"Gave up reconnecting '{}' after {} attempts",
				connection.key(),
				self.policy.max_attempts
			),
			Some(Box::new(last_error)),
			Some(HashMap::from([
				("chain_id".to_string(), connection.chain_id().to_string()),
				(
					"attempts".to_string(),
					self.policy.max_attempts.to_string(),
				),
			])),
		);
		self.fail(connection).await;
		Err(error)
	}

	/// Creates a new raw connection, waits until it is ready and swaps it in
	///
	/// Runs on its own task: the probe task may be aborted by a teardown at any point, and the
	/// chains loaded for the new connection must still be released.
	async fn attempt(&self, connection: &Arc<Connection>) -> Result<(), ConnectionError> {
		let factory = self.factory.clone();
		let loader = self.loader.clone();
		let ready_timeout = self.ready_timeout;
		let connection = connection.clone();

		tokio::spawn(async move {
			let raw = factory
				.create(connection.descriptor(), connection.key().mode)
				.await?;

			let ready = tokio::select! {
				outcome = await_ready(raw.client.clone(), ready_timeout, connection.chain_id()) => outcome.map(|_| ()),
				_ = connection.closed() => Err(closed_while_reconnecting()),
			};
			if let Err(e) = ready {
				discard(loader.as_deref(), raw).await;
				return Err(e);
			}

			match connection.replace(raw).await {
				Ok(replaced) => {
					discard(loader.as_deref(), replaced).await;
					Ok(())
				}
				Err(raw) => {
					discard(loader.as_deref(), raw).await;
					Err(closed_while_reconnecting())
				}
			}
		})
		.await
		.unwrap_or_else(|e| {
			Err(ConnectionError::closed(
				format!("Reconnect attempt aborted: {}", e),
				Some(Box::new(e)),
				None,
			))
		})
	}

	/// Evicts the connection and frees its resources; `Failed` is published last
	async fn fail(&self, connection: &Arc<Connection>) {
		self.cache
			.evict_connection(connection.key(), connection.id())
			.await;

		let client = connection.client().await;
		if let Err(e) = client.destroy().await {
			tracing::warn!(connection = %connection.key(), error = %e, "Failed to destroy client");
		}
		release_chains(self.loader.as_deref(), connection.take_light_chains().await).await;

		connection.set_state(ConnectionState::Failed);
		tracing::error!(connection = %connection.key(), "Connection failed");
	}
}

fn closed_while_reconnecting() -> ConnectionError {
	ConnectionError::closed("Connection was closed while reconnecting", None, None)
}

/// Destroys a raw client and releases its light-client chains
async fn discard(loader: Option<&LightClientChainLoader>, raw: RawConnection) {
	if let Err(e) = raw.client.destroy().await {
		tracing::warn!(endpoint = %raw.client.endpoint(), error = %e, "Failed to destroy client");
	}
	release_chains(loader, raw.light_chains).await;
}

/// Releases chains in reverse load order, parachain before relay
async fn release_chains(
	loader: Option<&LightClientChainLoader>,
	chains: Vec<Arc<LightClientChainHandle>>,
) {
	let Some(loader) = loader else {
		return;
	};
	for handle in chains.iter().rev() {
		if let Err(e) = loader.release(handle).await {
			tracing::warn!(chain = %handle.chain_id(), error = %e, "Failed to release light client chain");
		}
	}
}
