//! Shared setup of the connection manager tests.

use std::sync::Arc;

use substrate_connect::{
	models::{ChainDescriptor, ManagerConfig},
	repositories::{ChainRegistry, ChainSpecRegistry},
	services::connection::{
		transports::{LightClientRuntime, SocketConnector},
		ConnectionManager,
	},
	utils::tests::builders::chain::ChainDescriptorBuilder,
};

use crate::integration::mocks::{spec_registry_with, StubConnector, StubRuntime};

mod light_client;
mod manager;
mod reconnection;

/// `west` relay with two parachains, one socket endpoint each
pub fn test_chains() -> Vec<ChainDescriptor> {
	vec![
		ChainDescriptorBuilder::new().relay("west").build(),
		ChainDescriptorBuilder::new()
			.system_parachain("west_asset_hub", "west", 1000)
			.build(),
		ChainDescriptorBuilder::new()
			.system_parachain("west_bridge_hub", "west", 1002)
			.build(),
	]
}

pub fn test_registry() -> Arc<ChainRegistry> {
	Arc::new(ChainRegistry::from_descriptors(test_chains()).unwrap())
}

pub fn socket_manager(config: ManagerConfig, connector: Arc<StubConnector>) -> ConnectionManager {
	let socket: Arc<dyn SocketConnector> = connector;
	ConnectionManager::new(
		config,
		test_registry(),
		Arc::new(spec_registry_with(&[])),
		socket,
		None,
	)
}

pub fn light_client_manager(
	config: ManagerConfig,
	connector: Arc<StubConnector>,
	runtime: Arc<StubRuntime>,
	specs: &[&str],
) -> ConnectionManager {
	let socket: Arc<dyn SocketConnector> = connector;
	let runtime: Arc<dyn LightClientRuntime> = runtime;
	let spec_registry: Arc<dyn ChainSpecRegistry> = Arc::new(spec_registry_with(specs));
	ConnectionManager::new(config, test_registry(), spec_registry, socket, Some(runtime))
}
