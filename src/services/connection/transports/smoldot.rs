//! Embedded light client built on `smoldot-light`.
//!
//! Every loaded chain is added once with JSON-RPC disabled; it keeps the chain synchronized
//! for as long as the loader holds it. Each [`RawClient`] opened with
//! [`LightClientRuntime::connect_chain`] adds the same specification again with JSON-RPC
//! enabled. smoldot shares the underlying chain services between identical chains, so this only
//! allocates a new JSON-RPC frontend.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::{json, Value};
use smoldot_light::{
	platform::default::DefaultPlatform, AddChainConfig, AddChainConfigJsonRpc, AddChainSuccess,
	ChainId, Client, JsonRpcResponses,
};
use std::{
	collections::{HashMap, HashSet},
	iter,
	num::NonZeroU32,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc, Mutex as StdMutex,
	},
};
use tokio::{
	sync::{mpsc, oneshot, Mutex},
	task::AbortHandle,
};

use super::{
	BlockNotification, BlockSubscription, LightClientRuntime, NativeChainRef, RawClient,
	TransportError,
};

const MAX_SUBSCRIPTIONS: u32 = 1024;
const MAX_ORPHANED_NOTIFICATIONS: usize = 64;

fn chain_metadata(chain: &str) -> Option<HashMap<String, String>> {
	Some(HashMap::from([("chain".to_string(), chain.to_string())]))
}

struct LoadedChain {
	label: String,
	spec: String,
	relay: Option<NativeChainRef>,
}

struct RuntimeState {
	client: Option<Client<Arc<DefaultPlatform>>>,
	chains: HashMap<NativeChainRef, LoadedChain>,
	/// JSON-RPC frontends opened by `connect_chain` that are still alive
	views: HashSet<usize>,
}

/// Light-client runtime backed by an in-process smoldot client
pub struct SmoldotRuntime {
	state: Arc<Mutex<RuntimeState>>,
}

impl SmoldotRuntime {
	pub fn new(client_name: &str, client_version: &str) -> Self {
		let platform = DefaultPlatform::new(client_name.to_string(), client_version.to_string());
		Self {
			state: Arc::new(Mutex::new(RuntimeState {
				client: Some(Client::new(platform)),
				chains: HashMap::new(),
				views: HashSet::new(),
			})),
		}
	}

	fn terminated(chain: &str) -> TransportError {
		TransportError::light_client(
			"Light client runtime has been terminated",
			None,
			chain_metadata(chain),
		)
	}
}

#[async_trait]
impl LightClientRuntime for SmoldotRuntime {
	async fn add_chain(
		&self,
		chain_id: &str,
		spec: &str,
		relay: Option<NativeChainRef>,
	) -> Result<NativeChainRef, TransportError> {
		let mut state = self.state.lock().await;
		let client = state
			.client
			.as_mut()
			.ok_or_else(|| Self::terminated(chain_id))?;

		let AddChainSuccess { chain_id: added, .. } = client
			.add_chain(AddChainConfig {
				user_data: (),
				specification: spec,
				database_content: "",
				potential_relay_chains: relay.map(|r| ChainId::from(r.0)).into_iter(),
				json_rpc: AddChainConfigJsonRpc::Disabled,
			})
			.map_err(|e| {
				TransportError::light_client(
					format!("Failed to add chain: {}", e),
					None,
					chain_metadata(chain_id),
				)
			})?;

		let native = NativeChainRef(usize::from(added));
		state.chains.insert(
			native,
			LoadedChain {
				label: chain_id.to_string(),
				spec: spec.to_string(),
				relay,
			},
		);
		tracing::info!(chain = %chain_id, "Chain added to light client");
		Ok(native)
	}

	async fn connect_chain(
		&self,
		chain: NativeChainRef,
	) -> Result<Arc<dyn RawClient>, TransportError> {
		let mut state = self.state.lock().await;
		let RuntimeState {
			client,
			chains,
			views,
		} = &mut *state;

		let loaded = chains.get(&chain).ok_or_else(|| {
			TransportError::light_client(
				"Chain is not loaded in the light client",
				None,
				chain_metadata(&chain.0.to_string()),
			)
		})?;
		let client = client
			.as_mut()
			.ok_or_else(|| Self::terminated(&loaded.label))?;

		let AddChainSuccess {
			chain_id: view,
			json_rpc_responses,
		} = client
			.add_chain(AddChainConfig {
				user_data: (),
				specification: &loaded.spec,
				database_content: "",
				potential_relay_chains: loaded.relay.map(|r| ChainId::from(r.0)).into_iter(),
				json_rpc: AddChainConfigJsonRpc::Enabled {
					max_pending_requests: NonZeroU32::MAX,
					max_subscriptions: MAX_SUBSCRIPTIONS,
				},
			})
			.map_err(|e| {
				TransportError::light_client(
					format!("Failed to open JSON-RPC channel: {}", e),
					None,
					chain_metadata(&loaded.label),
				)
			})?;

		let Some(responses) = json_rpc_responses else {
			let () = client.remove_chain(view);
			return Err(TransportError::light_client(
				"Light client did not provide a JSON-RPC channel",
				None,
				chain_metadata(&loaded.label),
			));
		};

		views.insert(usize::from(view));
		Ok(Arc::new(SmoldotClient::spawn(
			self.state.clone(),
			view,
			loaded.label.clone(),
			responses,
		)))
	}

	async fn remove_chain(&self, chain: NativeChainRef) -> Result<(), TransportError> {
		let mut state = self.state.lock().await;
		let Some(loaded) = state.chains.remove(&chain) else {
			return Ok(());
		};
		if let Some(client) = state.client.as_mut() {
			let () = client.remove_chain(ChainId::from(chain.0));
			tracing::info!(chain = %loaded.label, "Chain removed from light client");
		}
		Ok(())
	}

	async fn terminate(&self) -> Result<(), TransportError> {
		let mut state = self.state.lock().await;
		state.chains.clear();
		state.views.clear();
		if state.client.take().is_some() {
			tracing::info!("Light client runtime terminated");
		}
		Ok(())
	}
}

/// Routes JSON-RPC responses of one frontend to their waiters
#[derive(Default)]
struct Router {
	pending: HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>,
	subscriptions: HashMap<String, mpsc::UnboundedSender<Value>>,
	/// Subscribe calls whose subscription id is not registered yet
	opening: usize,
	/// Notifications that arrived before their subscription id was registered
	orphans: HashMap<String, Vec<Value>>,
}

impl Router {
	fn dispatch(&mut self, label: &str, message: &str) {
		let Ok(message) = serde_json::from_str::<Value>(message) else {
			tracing::warn!(chain = %label, "Dropping malformed JSON-RPC message");
			return;
		};

		if let Some(id) = message.get("id").and_then(Value::as_u64) {
			if let Some(waiter) = self.pending.remove(&id) {
				let outcome = match message.get("error") {
					Some(error) => Err(classify_rpc_error(label, error)),
					None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
				};
				let _ = waiter.send(outcome);
			}
			return;
		}

		let params = message.get("params");
		let subscription = params
			.and_then(|p| p.get("subscription"))
			.and_then(|s| s.as_str().map(str::to_string).or_else(|| Some(s.to_string())));
		let result = params.and_then(|p| p.get("result")).cloned();
		if let (Some(subscription), Some(result)) = (subscription, result) {
			match self.subscriptions.get(&subscription) {
				Some(sender) => {
					let _ = sender.send(result);
				}
				None => self.hold_orphan(label, subscription, result),
			}
		}
	}

	/// Keeps a notification for a subscription that may still be registered
	///
	/// Only possible while a subscribe call is in flight; anything else belongs to a
	/// subscription that was already dropped.
	fn hold_orphan(&mut self, label: &str, subscription: String, result: Value) {
		let held: usize = self.orphans.values().map(Vec::len).sum();
		if self.opening == 0 || held >= MAX_ORPHANED_NOTIFICATIONS {
			tracing::trace!(chain = %label, subscription = %subscription, "Dropping notification of unknown subscription");
			return;
		}
		self.orphans.entry(subscription).or_default().push(result);
	}

	fn begin_subscription(&mut self) {
		self.opening += 1;
	}

	/// Registers a subscription and hands over the notifications that arrived early
	fn register(&mut self, subscription: String, sender: mpsc::UnboundedSender<Value>) {
		for early in self.orphans.remove(&subscription).unwrap_or_default() {
			let _ = sender.send(early);
		}
		self.subscriptions.insert(subscription, sender);
		self.end_subscription();
	}

	/// Marks a subscribe call as finished without registering anything
	fn end_subscription(&mut self) {
		self.opening = self.opening.saturating_sub(1);
		if self.opening == 0 {
			self.orphans.clear();
		}
	}

	fn unsubscribe(&mut self, subscription: &str) {
		self.subscriptions.remove(subscription);
		self.orphans.remove(subscription);
	}

	/// Drops every waiter; pending requests fail and subscriptions end
	fn close(&mut self) {
		self.pending.clear();
		self.subscriptions.clear();
		self.opening = 0;
		self.orphans.clear();
	}
}

fn classify_rpc_error(label: &str, error: &Value) -> TransportError {
	let message = error
		.get("message")
		.and_then(Value::as_str)
		.unwrap_or("unknown JSON-RPC error")
		.to_string();
	TransportError::request(message, None, chain_metadata(label))
}

/// JSON-RPC client on one smoldot frontend
struct SmoldotClient {
	state: Arc<Mutex<RuntimeState>>,
	view: ChainId,
	label: String,
	router: Arc<StdMutex<Router>>,
	next_id: AtomicU64,
	destroyed: AtomicBool,
	reader: AbortHandle,
}

impl SmoldotClient {
	fn spawn(
		state: Arc<Mutex<RuntimeState>>,
		view: ChainId,
		label: String,
		mut responses: JsonRpcResponses,
	) -> Self {
		let router = Arc::new(StdMutex::new(Router::default()));
		let reader_router = router.clone();
		let reader_label = label.clone();

		let reader = tokio::spawn(async move {
			while let Some(message) = responses.next().await {
				if let Ok(mut router) = reader_router.lock() {
					router.dispatch(&reader_label, &message);
				}
			}
			tracing::debug!(chain = %reader_label, "Light client JSON-RPC channel closed");
			if let Ok(mut router) = reader_router.lock() {
				router.close();
			}
		})
		.abort_handle();

		Self {
			state,
			view,
			label,
			router,
			next_id: AtomicU64::new(1),
			destroyed: AtomicBool::new(false),
			reader,
		}
	}

	fn closed_error(&self) -> TransportError {
		TransportError::stream_closed(
			"Connection closed: light client channel is gone",
			None,
			chain_metadata(&self.label),
		)
	}

	async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
		if self.destroyed.load(Ordering::SeqCst) {
			return Err(self.closed_error());
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let (sender, receiver) = oneshot::channel();
		self.router
			.lock()
			.map_err(|_| self.closed_error())?
			.pending
			.insert(id, sender);

		let request = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		})
		.to_string();

		{
			let mut guard = self.state.lock().await;
			let state = &mut *guard;
			if !state.views.contains(&usize::from(self.view)) {
				return Err(self.closed_error());
			}
			let Some(client) = state.client.as_mut() else {
				return Err(self.closed_error());
			};
			client.json_rpc_request(request, self.view).map_err(|e| {
				TransportError::request(
					format!("{} rejected: {}", method, e),
					None,
					chain_metadata(&self.label),
				)
			})?;
		}

		receiver.await.map_err(|_| self.closed_error())?
	}
}

#[async_trait]
impl RawClient for SmoldotClient {
	fn endpoint(&self) -> String {
		format!("light-client://{}", self.label)
	}

	async fn subscribe_best_blocks(&self) -> Result<BlockSubscription, TransportError> {
		self.router
			.lock()
			.map_err(|_| self.closed_error())?
			.begin_subscription();

		let subscription_id = match self.request("chain_subscribeNewHeads", json!([])).await {
			Ok(Value::String(id)) => id,
			Ok(other) => other.to_string(),
			Err(e) => {
				if let Ok(mut router) = self.router.lock() {
					router.end_subscription();
				}
				return Err(e);
			}
		};

		let (sender, receiver) = mpsc::unbounded_channel();
		self.router
			.lock()
			.map_err(|_| self.closed_error())?
			.register(subscription_id.clone(), sender);

		let guard = UnsubscribeOnDrop {
			state: self.state.clone(),
			router: self.router.clone(),
			view: self.view,
			subscription_id,
		};

		Ok(stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
			receiver
				.recv()
				.await
				.map(|header| (Ok(BlockNotification::from_header(header)), (receiver, guard)))
		})
		.boxed())
	}

	async fn finalized_block(&self) -> Result<String, TransportError> {
		match self.request("chain_getFinalizedHead", json!([])).await? {
			Value::String(hash) => Ok(hash),
			other => Err(TransportError::request(
				format!("Unexpected finalized head response: {}", other),
				None,
				chain_metadata(&self.label),
			)),
		}
	}

	async fn destroy(&self) -> Result<(), TransportError> {
		if self.destroyed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		self.reader.abort();
		if let Ok(mut router) = self.router.lock() {
			router.close();
		}

		let mut state = self.state.lock().await;
		let live = state.views.remove(&usize::from(self.view));
		if let (true, Some(client)) = (live, state.client.as_mut()) {
			let () = client.remove_chain(self.view);
		}
		Ok(())
	}
}

/// Sends `chain_unsubscribeNewHeads` when a best-block stream is dropped
struct UnsubscribeOnDrop {
	state: Arc<Mutex<RuntimeState>>,
	router: Arc<StdMutex<Router>>,
	view: ChainId,
	subscription_id: String,
}

impl Drop for UnsubscribeOnDrop {
	fn drop(&mut self) {
		if let Ok(mut router) = self.router.lock() {
			router.unsubscribe(&self.subscription_id);
		}

		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			return;
		};
		let state = self.state.clone();
		let view = self.view;
		let request = json!({
			"jsonrpc": "2.0",
			"id": Value::Null,
			"method": "chain_unsubscribeNewHeads",
			"params": [self.subscription_id],
		})
		.to_string();

		handle.spawn(async move {
			let mut state = state.lock().await;
			if !state.views.contains(&usize::from(view)) {
				return;
			}
			if let Some(client) = state.client.as_mut() {
				let _ = client.json_rpc_request(request, view);
			}
		});
	}
}
