//! Light-client chain loader.
//!
//! Loads chains into the embedded light-client runtime. A relay chain shared by several
//! parachains is loaded once and reference counted; a parachain is only loaded on top of a
//! relay chain that is already loaded.

use futures::{
	future::{BoxFuture, Shared},
	FutureExt,
};
use std::{
	collections::HashMap,
	fmt,
	sync::{Arc, Weak},
};
use tokio::sync::Mutex;

use crate::{
	models::ChainDescriptor,
	services::connection::{
		transports::{LightClientRuntime, NativeChainRef, RawClient},
		ConnectionError,
	},
};

/// A chain loaded into the light-client runtime
pub struct LightClientChainHandle {
	chain_id: String,
	relay: Option<Weak<LightClientChainHandle>>,
	native: NativeChainRef,
}

impl LightClientChainHandle {
	pub fn chain_id(&self) -> &str {
		&self.chain_id
	}

	pub fn native(&self) -> NativeChainRef {
		self.native
	}

	/// Relay chain this chain is anchored to, while it is still alive
	pub fn relay(&self) -> Option<Arc<LightClientChainHandle>> {
		self.relay.as_ref().and_then(Weak::upgrade)
	}
}

impl fmt::Debug for LightClientChainHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LightClientChainHandle")
			.field("chain_id", &self.chain_id)
			.field("native", &self.native)
			.field("relay", &self.relay().map(|r| r.chain_id.clone()))
			.finish()
	}
}

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<LightClientChainHandle>, ConnectionError>>>;

enum SlotState {
	Loading { generation: u64, future: LoadFuture },
	Loaded(Arc<LightClientChainHandle>),
}

struct Slot {
	state: SlotState,
	/// Number of `load` calls not yet matched by a `release`
	refs: usize,
}

#[derive(Default)]
struct LoaderState {
	slots: HashMap<String, Slot>,
	generations: u64,
}

fn chain_metadata(chain_id: &str) -> Option<HashMap<String, String>> {
	Some(HashMap::from([(
		"chain_id".to_string(),
		chain_id.to_string(),
	)]))
}

/// Loads and unloads chains in a [`LightClientRuntime`]
pub struct LightClientChainLoader {
	runtime: Arc<dyn LightClientRuntime>,
	state: Arc<Mutex<LoaderState>>,
}

impl LightClientChainLoader {
	pub fn new(runtime: Arc<dyn LightClientRuntime>) -> Self {
		Self {
			runtime,
			state: Arc::new(Mutex::new(LoaderState::default())),
		}
	}

	/// Loads `descriptor` (or joins an in-flight load) and takes a reference on it
	///
	/// Parachains must pass the handle of their loaded relay chain; otherwise the call fails
	/// with [`ConnectionError::RelayChainNotLoaded`] before anything is sent to the runtime.
	pub async fn load(
		&self,
		descriptor: &ChainDescriptor,
		spec: &str,
		relay: Option<Arc<LightClientChainHandle>>,
	) -> Result<Arc<LightClientChainHandle>, ConnectionError> {
		let future = {
			let mut state = self.state.lock().await;

			if descriptor.is_parachain() {
				Self::check_relay(&state, descriptor, relay.as_ref())?;
			}

			if let Some(slot) = state.slots.get_mut(&descriptor.id) {
				slot.refs += 1;
				match &slot.state {
					SlotState::Loaded(handle) => {
						tracing::debug!(chain = %descriptor.id, refs = slot.refs, "Light client chain already loaded");
						return Ok(handle.clone());
					}
					SlotState::Loading { future, .. } => future.clone(),
				}
			} else {
				state.generations += 1;
				let generation = state.generations;
				let future = self.spawn_load(descriptor, spec, relay, generation);
				state.slots.insert(
					descriptor.id.clone(),
					Slot {
						state: SlotState::Loading {
							generation,
							future: future.clone(),
						},
						refs: 1,
					},
				);
				future
			}
		};

		future.await
	}

	fn check_relay(
		state: &LoaderState,
		descriptor: &ChainDescriptor,
		relay: Option<&Arc<LightClientChainHandle>>,
	) -> Result<(), ConnectionError> {
		let expected = descriptor.relay_chain_id.as_deref().unwrap_or_default();
		let loaded = relay.is_some_and(|relay| {
			relay.chain_id == expected
				&& matches!(
					state.slots.get(expected),
					Some(Slot { state: SlotState::Loaded(current), .. }) if Arc::ptr_eq(current, relay)
				)
		});

		if loaded {
			Ok(())
		} else {
			Err(ConnectionError::relay_chain_not_loaded(
				format!(
					"Relay chain '{}' must be loaded before '{}'",
					expected, descriptor.id
				),
				None,
				Some(HashMap::from([
					("chain_id".to_string(), descriptor.id.clone()),
					("relay_chain_id".to_string(), expected.to_string()),
				])),
			))
		}
	}

	fn spawn_load(
		&self,
		descriptor: &ChainDescriptor,
		spec: &str,
		relay: Option<Arc<LightClientChainHandle>>,
		generation: u64,
	) -> LoadFuture {
		let runtime = self.runtime.clone();
		let state = self.state.clone();
		let chain_id = descriptor.id.clone();
		let spec = spec.to_string();

		let task = tokio::spawn(async move {
			tracing::info!(chain = %chain_id, "Loading chain into light client");
			let outcome = runtime
				.add_chain(&chain_id, &spec, relay.as_ref().map(|r| r.native))
				.await
				.map(|native| {
					Arc::new(LightClientChainHandle {
						chain_id: chain_id.clone(),
						relay: relay.as_ref().map(Arc::downgrade),
						native,
					})
				})
				.map_err(ConnectionError::from);

			let mut state = state.lock().await;
			let current = matches!(
				state.slots.get(&chain_id),
				Some(Slot { state: SlotState::Loading { generation: g, .. }, .. }) if *g == generation
			);
			if current {
				match &outcome {
					Ok(handle) => {
						if let Some(slot) = state.slots.get_mut(&chain_id) {
							slot.state = SlotState::Loaded(handle.clone());
						}
					}
					Err(_) => {
						state.slots.remove(&chain_id);
					}
				}
			}
			outcome
		});

		async move {
			task.await.unwrap_or_else(|e| {
				Err(ConnectionError::closed(
					format!("Chain load aborted: {}", e),
					Some(Box::new(e)),
					None,
				))
			})
		}
		.boxed()
		.shared()
	}

	/// Opens a JSON-RPC client on a loaded chain
	pub async fn connect(
		&self,
		handle: &Arc<LightClientChainHandle>,
	) -> Result<Arc<dyn RawClient>, ConnectionError> {
		if !self.holds(handle).await {
			return Err(ConnectionError::closed(
				format!("Chain '{}' is no longer loaded", handle.chain_id),
				None,
				chain_metadata(&handle.chain_id),
			));
		}
		Ok(self.runtime.connect_chain(handle.native).await?)
	}

	/// Drops one reference; the chain is removed from the runtime with the last one
	pub async fn release(&self, handle: &Arc<LightClientChainHandle>) -> Result<(), ConnectionError> {
		let remove = {
			let mut state = self.state.lock().await;
			let Some(slot) = state.slots.get_mut(&handle.chain_id) else {
				return Ok(());
			};
			match &slot.state {
				SlotState::Loaded(current) if Arc::ptr_eq(current, handle) => {}
				_ => return Ok(()),
			}

			slot.refs = slot.refs.saturating_sub(1);
			if slot.refs == 0 {
				state.slots.remove(&handle.chain_id);
				true
			} else {
				false
			}
		};

		if remove {
			tracing::info!(chain = %handle.chain_id, "Unloading chain from light client");
			self.runtime.remove_chain(handle.native).await?;
		}
		Ok(())
	}

	async fn holds(&self, handle: &Arc<LightClientChainHandle>) -> bool {
		matches!(
			self.state.lock().await.slots.get(&handle.chain_id),
			Some(Slot { state: SlotState::Loaded(current), .. }) if Arc::ptr_eq(current, handle)
		)
	}

	pub async fn is_loaded(&self, chain_id: &str) -> bool {
		matches!(
			self.state.lock().await.slots.get(chain_id),
			Some(Slot {
				state: SlotState::Loaded(_),
				..
			})
		)
	}

	/// Outstanding references on a chain
	pub async fn references(&self, chain_id: &str) -> usize {
		self.state
			.lock()
			.await
			.slots
			.get(chain_id)
			.map_or(0, |slot| slot.refs)
	}

	/// Forgets every chain and terminates the runtime
	pub async fn shutdown(&self) -> Result<(), ConnectionError> {
		let unloaded = {
			let mut state = self.state.lock().await;
			let count = state.slots.len();
			state.slots.clear();
			count
		};
		tracing::info!(chains = unloaded, "Shutting down light client runtime");
		Ok(self.runtime.terminate().await?)
	}
}
