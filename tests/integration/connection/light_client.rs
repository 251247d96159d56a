use std::{sync::atomic::Ordering, time::Duration};

use substrate_connect::{
	models::{AcquireOptions, ConnectionState, ManagerConfig, TransportMode},
	services::connection::{transports::NativeChainRef, ConnectionError, LightClientChainLoader},
};

use super::{light_client_manager, test_registry};
use crate::integration::mocks::{ReadyBehavior, StubConnector, StubRuntime};

fn light_config() -> ManagerConfig {
	ManagerConfig {
		transport_mode: TransportMode::LightClient,
		..ManagerConfig::default()
	}
}

#[tokio::test]
async fn test_parachain_loads_relay_first() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let runtime = StubRuntime::new();
	let manager = light_client_manager(
		light_config(),
		connector.clone(),
		runtime.clone(),
		&["west", "west_asset_hub"],
	);

	let connection = manager
		.acquire("west_asset_hub", AcquireOptions::default())
		.await
		.unwrap();

	assert_eq!(runtime.added_ids(), vec!["west", "west_asset_hub"]);
	let added = runtime.added.lock().unwrap().clone();
	assert_eq!(added[1].1, runtime.native_of("west"));
	assert_eq!(
		connection.light_chain_ids().await,
		vec!["west", "west_asset_hub"]
	);
	assert_eq!(connector.attempt_count(), 0);
}

#[tokio::test]
async fn test_shared_relay_is_loaded_once() {
	let runtime = StubRuntime::new();
	let manager = light_client_manager(
		light_config(),
		StubConnector::new(ReadyBehavior::Immediate),
		runtime.clone(),
		&["west", "west_asset_hub", "west_bridge_hub"],
	);

	let (hub, bridge) = tokio::join!(
		manager.acquire("west_asset_hub", AcquireOptions::default()),
		manager.acquire("west_bridge_hub", AcquireOptions::default())
	);
	let (hub, bridge) = (hub.unwrap(), bridge.unwrap());

	let ids = runtime.added_ids();
	assert_eq!(ids.iter().filter(|id| *id == "west").count(), 1);
	assert_eq!(ids.len(), 3);

	let loader = manager.loader().unwrap();
	assert_eq!(loader.references("west").await, 2);

	// The relay stays loaded until its last parachain is released
	manager.release(hub).await;
	assert!(loader.is_loaded("west").await);
	assert!(!loader.is_loaded("west_asset_hub").await);

	manager.release(bridge).await;
	assert!(!loader.is_loaded("west").await);
	assert_eq!(runtime.removed.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_release_unloads_parachain_before_relay() {
	let runtime = StubRuntime::new();
	let manager = light_client_manager(
		light_config(),
		StubConnector::new(ReadyBehavior::Immediate),
		runtime.clone(),
		&["west", "west_asset_hub"],
	);

	let connection = manager
		.acquire("west_asset_hub", AcquireOptions::default())
		.await
		.unwrap();
	manager.release(connection).await;

	assert_eq!(
		*runtime.removed.lock().unwrap(),
		vec![
			runtime.native_of("west_asset_hub").unwrap(),
			runtime.native_of("west").unwrap()
		]
	);
}

#[tokio::test]
async fn test_missing_parachain_spec_falls_back_to_socket() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let runtime = StubRuntime::new();
	let manager =
		light_client_manager(light_config(), connector.clone(), runtime.clone(), &["west"]);

	let connection = manager
		.acquire("west_asset_hub", AcquireOptions::default())
		.await
		.unwrap();

	assert!(connection.light_chain_ids().await.is_empty());
	assert_eq!(
		connection.client().await.endpoint(),
		"wss://west_asset_hub.test"
	);
	assert!(runtime.added_ids().is_empty());
	assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test]
async fn test_parachain_without_loaded_relay_fails_fast() {
	let runtime = StubRuntime::new();
	let loader = LightClientChainLoader::new(runtime.clone());
	let registry = test_registry();
	let hub = registry.lookup_by_id("west_asset_hub").unwrap();

	let err = loader.load(hub, "{}", None).await.unwrap_err();

	assert!(matches!(err, ConnectionError::RelayChainNotLoaded(_)));
	assert!(runtime.added_ids().is_empty());
}

#[tokio::test]
async fn test_shutdown_terminates_runtime() {
	let runtime = StubRuntime::new();
	let manager = light_client_manager(
		light_config(),
		StubConnector::new(ReadyBehavior::Immediate),
		runtime.clone(),
		&["west"],
	);

	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	manager.shutdown().await.unwrap();

	assert!(connection.is_closed());
	assert_eq!(*runtime.removed.lock().unwrap(), vec![NativeChainRef(0)]);
	assert!(runtime.terminated.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_release_during_reconnect_unloads_chains() {
	let runtime = StubRuntime::new();
	*runtime.later_ready.lock().unwrap() = ReadyBehavior::Never;
	let config = ManagerConfig {
		base_backoff_ms: 1_000,
		probe_interval_ms: 500,
		..light_config()
	};
	let manager = light_client_manager(
		config,
		StubConnector::new(ReadyBehavior::Immediate),
		runtime.clone(),
		&["west"],
	);
	let loader = manager.loader().unwrap().clone();

	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	let mut states = connection.subscribe_state();
	runtime.disconnected.store(true, Ordering::SeqCst);
	states
		.wait_for(|state| matches!(state, ConnectionState::Reconnecting { .. }))
		.await
		.unwrap();

	// Probe fails at 0.5s, the attempt loads the chain again at 1.5s and waits for readiness
	tokio::time::sleep(Duration::from_secs(2)).await;
	assert_eq!(loader.references("west").await, 2);

	manager.release(connection).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert_eq!(loader.references("west").await, 0);
	assert!(!loader.is_loaded("west").await);
	assert_eq!(
		*runtime.removed.lock().unwrap(),
		vec![runtime.native_of("west").unwrap()]
	);
}
