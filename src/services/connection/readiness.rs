//! Readiness tracking.
//!
//! A connection is ready once its client delivered the first best-block notification.

use futures::{
	future::{BoxFuture, Shared},
	FutureExt, StreamExt,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::task::AbortHandle;

use crate::services::connection::{
	transports::{RawClient, TransportError},
	ConnectionError,
};

/// Waits for the first best block of `client`
///
/// The best-block subscription is dropped, and thereby cancelled, whichever outcome comes
/// first. Returns the number of the first block when the header could be decoded.
pub async fn await_ready(
	client: Arc<dyn RawClient>,
	timeout: Duration,
	chain_id: &str,
) -> Result<Option<u64>, ConnectionError> {
	let first_block = async {
		let mut subscription = client.subscribe_best_blocks().await?;
		match subscription.next().await {
			Some(Ok(block)) => Ok(block.number),
			Some(Err(e)) => Err(ConnectionError::from(e)),
			None => Err(ConnectionError::from(TransportError::stream_closed(
				"Best-block stream ended before the first block",
				None,
				Some(HashMap::from([(
					"endpoint".to_string(),
					client.endpoint(),
				)])),
			))),
		}
	};

	match tokio::time::timeout(timeout, first_block).await {
		Ok(outcome) => {
			if let Ok(number) = &outcome {
				tracing::debug!(chain = %chain_id, block = ?number, "Connection is ready");
			}
			outcome
		}
		Err(_) => Err(ConnectionError::connection_timeout(
			format!(
				"No best block received within {}ms",
				timeout.as_millis()
			),
			None,
			Some(HashMap::from([
				("chain_id".to_string(), chain_id.to_string()),
				("endpoint".to_string(), client.endpoint()),
			])),
		)),
	}
}

type ReadinessFuture = Shared<BoxFuture<'static, Result<Option<u64>, ConnectionError>>>;

/// Memoized readiness of one connection
///
/// Tracking starts as soon as the tracker is created; every caller of [`Readiness::wait`]
/// observes the same outcome.
pub struct Readiness {
	outcome: ReadinessFuture,
	abort: AbortHandle,
	timeout: Duration,
}

impl Readiness {
	pub fn track(client: Arc<dyn RawClient>, timeout: Duration, chain_id: String) -> Self {
		let task = tokio::spawn(async move { await_ready(client, timeout, &chain_id).await });
		let abort = task.abort_handle();

		let outcome = async move {
			match task.await {
				Ok(outcome) => outcome,
				Err(e) if e.is_cancelled() => Err(ConnectionError::closed(
					"Readiness tracking was cancelled",
					None,
					None,
				)),
				Err(e) => Err(ConnectionError::closed(
					format!("Readiness tracking failed: {}", e),
					Some(Box::new(e)),
					None,
				)),
			}
		}
		.boxed()
		.shared();

		Self {
			outcome,
			abort,
			timeout,
		}
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Resolves once the connection is ready or readiness failed
	pub async fn wait(&self) -> Result<Option<u64>, ConnectionError> {
		self.outcome.clone().await
	}

	/// Outcome, if tracking finished and the outcome was already observed
	pub fn peek(&self) -> Option<Result<Option<u64>, ConnectionError>> {
		self.outcome.peek().cloned()
	}

	/// Aborts tracking; pending and future waiters get [`ConnectionError::Closed`]
	pub fn cancel(&self) {
		self.abort.abort();
	}
}
