//! Single-flight connection cache.
//!
//! Concurrent requests for the same [`ConnectionKey`] share one creation. The in-flight
//! creation is stored before the first suspension point of the creating caller, so no two
//! creations for the same key ever overlap.
//!
//! Creation runs on its own task: a caller that stops waiting does not cancel the creation
//! for the other waiters.

use chrono::{DateTime, Utc};
use futures::{
	future::{BoxFuture, Shared},
	Future, FutureExt,
};
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
	models::ConnectionKey,
	services::connection::{Connection, ConnectionError},
};

/// Shared outcome of a connection creation
pub type ConnectionFuture = Shared<BoxFuture<'static, Result<Arc<Connection>, ConnectionError>>>;

/// Progress of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
	Pending,
	Ready,
}

struct CacheEntry {
	generation: u64,
	state: EntryState,
	/// Set once the creation succeeded
	connection_id: Option<Uuid>,
	future: ConnectionFuture,
	created_at: DateTime<Utc>,
}

impl CacheEntry {
	/// A ready entry whose connection already reached a terminal state
	fn is_stale(&self) -> bool {
		matches!(
			self.future.peek(),
			Some(Ok(connection)) if connection.state().is_terminal()
		)
	}
}

/// Keyed single-flight cache of connections
#[derive(Clone, Default)]
pub struct ConnectionCache {
	entries: Arc<Mutex<HashMap<ConnectionKey, CacheEntry>>>,
	generations: Arc<AtomicU64>,
}

impl ConnectionCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the existing creation for `key` or starts a new one with `create`
	///
	/// A failed creation removes its entry, so the next call starts over.
	pub async fn get_or_create<F, Fut>(&self, key: ConnectionKey, create: F) -> ConnectionFuture
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Arc<Connection>, ConnectionError>> + Send + 'static,
	{
		let mut entries = self.entries.lock().await;

		if let Some(entry) = entries.get(&key) {
			if !entry.is_stale() {
				tracing::debug!(connection = %key, state = ?entry.state, "Connection cache hit");
				return entry.future.clone();
			}
			tracing::debug!(connection = %key, "Replacing terminated connection");
		}

		tracing::debug!(connection = %key, "Connection cache miss");
		let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
		let creation = create();
		let cache = self.clone();
		let task_key = key.clone();

		let task = tokio::spawn(async move {
			let outcome = creation.await;
			cache.complete(&task_key, generation, &outcome).await;
			outcome
		});

		let future = async move {
			task.await.unwrap_or_else(|e| {
				Err(ConnectionError::closed(
					format!("Connection creation aborted: {}", e),
					Some(Box::new(e)),
					None,
				))
			})
		}
		.boxed()
		.shared();

		entries.insert(
			key,
			CacheEntry {
				generation,
				state: EntryState::Pending,
				connection_id: None,
				future: future.clone(),
				created_at: Utc::now(),
			},
		);
		future
	}

	async fn complete(
		&self,
		key: &ConnectionKey,
		generation: u64,
		outcome: &Result<Arc<Connection>, ConnectionError>,
	) {
		let mut entries = self.entries.lock().await;
		let Some(entry) = entries.get_mut(key) else {
			return;
		};
		if entry.generation != generation {
			return;
		}

		match outcome {
			Ok(connection) => {
				entry.state = EntryState::Ready;
				entry.connection_id = Some(connection.id());
			}
			Err(e) => {
				tracing::debug!(connection = %key, error = %e, "Connection creation failed, removing entry");
				entries.remove(key);
			}
		}
	}

	/// Removes the entry for `key` unconditionally
	pub async fn evict(&self, key: &ConnectionKey) -> bool {
		let removed = self.entries.lock().await.remove(key).is_some();
		if removed {
			tracing::debug!(connection = %key, "Connection evicted");
		}
		removed
	}

	/// Removes the entry for `key` only if it holds the connection `connection_id`
	pub async fn evict_connection(&self, key: &ConnectionKey, connection_id: Uuid) -> bool {
		let mut entries = self.entries.lock().await;
		let owned = entries
			.get(key)
			.is_some_and(|entry| entry.connection_id == Some(connection_id));
		if owned {
			entries.remove(key);
			tracing::debug!(connection = %key, id = %connection_id, "Connection evicted");
		}
		owned
	}

	pub async fn state(&self, key: &ConnectionKey) -> Option<EntryState> {
		self.entries.lock().await.get(key).map(|entry| entry.state)
	}

	pub async fn created_at(&self, key: &ConnectionKey) -> Option<DateTime<Utc>> {
		self.entries.lock().await.get(key).map(|entry| entry.created_at)
	}

	pub async fn contains(&self, key: &ConnectionKey) -> bool {
		self.entries.lock().await.contains_key(key)
	}

	pub async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.lock().await.is_empty()
	}

	pub async fn keys(&self) -> Vec<ConnectionKey> {
		self.entries.lock().await.keys().cloned().collect()
	}

	/// Empties the cache and returns every entry's creation
	pub async fn drain(&self) -> Vec<ConnectionFuture> {
		self.entries
			.lock()
			.await
			.drain()
			.map(|(_, entry)| entry.future)
			.collect()
	}
}
