//! Live connection wrapper.
//!
//! A [`Connection`] owns the raw client of one cache entry together with its readiness
//! tracker, the light-client chains it holds and the handle of its reconnection supervisor.

use chrono::{DateTime, Utc};
use std::{
	fmt,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex as StdMutex,
	},
	time::Duration,
};
use tokio::{
	sync::{watch, Mutex, OnceCell, RwLock},
	task::AbortHandle,
};
use uuid::Uuid;

use crate::{
	models::{ChainDescriptor, ConnectionKey, ConnectionState},
	services::connection::{
		loader::LightClientChainHandle, readiness::Readiness, transports::RawClient,
		ConnectionError,
	},
};

/// Output of the client factory: a raw client and the light-client chains it runs on
pub struct RawConnection {
	pub client: Arc<dyn RawClient>,
	/// Relay first, then the chain itself; empty for socket clients
	pub light_chains: Vec<Arc<LightClientChainHandle>>,
}

impl fmt::Debug for RawConnection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RawConnection")
			.field("endpoint", &self.client.endpoint())
			.field("light_chains", &self.light_chains)
			.finish()
	}
}

/// Handle returned to callers of the connection manager
pub type ConnectionHandle = Arc<Connection>;

pub struct Connection {
	id: Uuid,
	key: ConnectionKey,
	descriptor: ChainDescriptor,
	client: RwLock<Arc<dyn RawClient>>,
	light_chains: Mutex<Vec<Arc<LightClientChainHandle>>>,
	readiness: Readiness,
	supervisor: StdMutex<Option<AbortHandle>>,
	state: watch::Sender<ConnectionState>,
	/// Set when teardown starts; no client is swapped in afterwards
	closing: AtomicBool,
	/// Outcome of the one and only teardown
	pub(crate) teardown: OnceCell<Result<(), ConnectionError>>,
	created_at: DateTime<Utc>,
}

impl Connection {
	/// Wraps a raw connection; readiness tracking starts immediately
	pub(crate) fn new(
		key: ConnectionKey,
		descriptor: ChainDescriptor,
		raw: RawConnection,
		ready_timeout: Duration,
	) -> Arc<Self> {
		let endpoint = raw.client.endpoint();
		let readiness = Readiness::track(raw.client.clone(), ready_timeout, key.chain_id.clone());
		let (state, _) = watch::channel(ConnectionState::Connected);

		let connection = Arc::new(Self {
			id: Uuid::new_v4(),
			key,
			descriptor,
			client: RwLock::new(raw.client),
			light_chains: Mutex::new(raw.light_chains),
			readiness,
			supervisor: StdMutex::new(None),
			state,
			closing: AtomicBool::new(false),
			teardown: OnceCell::new(),
			created_at: Utc::now(),
		});

		tracing::info!(
			connection = %connection.key,
			id = %connection.id,
			endpoint = %endpoint,
			"Connection created"
		);
		connection
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn key(&self) -> &ConnectionKey {
		&self.key
	}

	pub fn chain_id(&self) -> &str {
		&self.key.chain_id
	}

	pub fn descriptor(&self) -> &ChainDescriptor {
		&self.descriptor
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	/// Current raw client; changes when the supervisor reconnects
	pub async fn client(&self) -> Arc<dyn RawClient> {
		self.client.read().await.clone()
	}

	/// Waits until the first best block arrived
	pub async fn ready(&self) -> Result<(), ConnectionError> {
		self.readiness.wait().await.map(|_| ())
	}

	pub(crate) fn readiness(&self) -> &Readiness {
		&self.readiness
	}

	/// Readiness timeout chosen by the caller that created the connection
	pub fn ready_timeout(&self) -> Duration {
		self.readiness.timeout()
	}

	pub fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	/// Watches liveness transitions
	pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
		self.state.subscribe()
	}

	pub fn is_closed(&self) -> bool {
		self.closing.load(Ordering::SeqCst)
			|| self.teardown.initialized()
			|| self.state() == ConnectionState::Closed
	}

	/// Resolves once the connection was torn down
	pub async fn closed(&self) {
		let mut states = self.state.subscribe();
		let _ = states
			.wait_for(|state| *state == ConnectionState::Closed)
			.await;
	}

	pub(crate) fn begin_close(&self) {
		self.closing.store(true, Ordering::SeqCst);
	}

	/// Publishes `state`; `Closed` is final and `Failed` can only become `Closed`
	pub(crate) fn set_state(&self, state: ConnectionState) {
		self.state.send_if_modified(|current| {
			let allowed = match *current {
				ConnectionState::Closed => false,
				ConnectionState::Failed => state == ConnectionState::Closed,
				_ => true,
			};
			if !allowed || *current == state {
				return false;
			}
			tracing::debug!(connection = %self.key, from = ?*current, to = ?state, "Connection state changed");
			*current = state;
			true
		});
	}

	pub(crate) fn set_supervisor(&self, handle: AbortHandle) {
		if let Ok(mut supervisor) = self.supervisor.lock() {
			*supervisor = Some(handle);
		}
	}

	pub(crate) fn take_supervisor(&self) -> Option<AbortHandle> {
		self.supervisor.lock().ok().and_then(|mut s| s.take())
	}

	pub(crate) async fn take_light_chains(&self) -> Vec<Arc<LightClientChainHandle>> {
		std::mem::take(&mut *self.light_chains.lock().await)
	}

	pub async fn light_chain_ids(&self) -> Vec<String> {
		self.light_chains
			.lock()
			.await
			.iter()
			.map(|h| h.chain_id().to_string())
			.collect()
	}

	/// Swaps in a freshly created raw connection and returns the replaced one
	///
	/// Once teardown started the new connection is handed back untouched.
	pub(crate) async fn replace(&self, raw: RawConnection) -> Result<RawConnection, RawConnection> {
		let mut client = self.client.write().await;
		let mut light_chains = self.light_chains.lock().await;
		if self.closing.load(Ordering::SeqCst) {
			return Err(raw);
		}
		Ok(RawConnection {
			client: std::mem::replace(&mut *client, raw.client),
			light_chains: std::mem::replace(&mut *light_chains, raw.light_chains),
		})
	}
}

impl fmt::Debug for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection")
			.field("id", &self.id)
			.field("key", &self.key)
			.field("state", &self.state())
			.field("created_at", &self.created_at)
			.finish()
	}
}
