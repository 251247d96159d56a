//! Bootstrap module for wiring the connection manager.
//!
//! Builds the chain registry, the chain spec registry and the transports from configuration and
//! hands them to [`ConnectionManager::new`].
//!
//! # Sources
//! - Chains: the built-in table, extended with the descriptors of an optional directory
//! - Chain specs: `<dir>/<chain_id>.json` when a spec directory is given, none otherwise
//! - Light client: the embedded smoldot runtime when the `smoldot` feature is enabled

use std::{error::Error, path::Path, sync::Arc};

use crate::{
	models::ManagerConfig,
	repositories::{
		ChainRegistry, ChainSpecRegistry, DirectoryChainSpecRegistry, InMemoryChainSpecRegistry,
	},
	services::connection::{transports::LightClientRuntime, ConnectionManager, WsConnector},
};

/// Type alias for handling errors during bootstrap
pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// Builds the chain registry from the built-in table and an optional descriptor directory
pub async fn load_chain_registry(chains_dir: Option<&Path>) -> Result<ChainRegistry> {
	let registry = ChainRegistry::builtin();
	match chains_dir {
		Some(dir) => Ok(registry.with_config_dir(Some(dir)).await?),
		None => Ok(registry),
	}
}

/// Picks the chain spec source
pub fn create_spec_registry(specs_dir: Option<&Path>) -> Arc<dyn ChainSpecRegistry> {
	match specs_dir {
		Some(dir) => Arc::new(DirectoryChainSpecRegistry::new(dir)),
		None => Arc::new(InMemoryChainSpecRegistry::new()),
	}
}

/// Embedded light-client runtime, if this build has one and it is enabled
pub fn create_light_client_runtime(
	config: &ManagerConfig,
) -> Option<Arc<dyn LightClientRuntime>> {
	if !config.light_client_enabled {
		return None;
	}

	#[cfg(feature = "smoldot")]
	{
		Some(Arc::new(
			crate::services::connection::transports::SmoldotRuntime::new(
				env!("CARGO_PKG_NAME"),
				env!("CARGO_PKG_VERSION"),
			),
		))
	}

	#[cfg(not(feature = "smoldot"))]
	{
		tracing::debug!("Built without the smoldot feature, light client disabled");
		None
	}
}

/// Initializes the connection manager
///
/// # Arguments
/// * `config` - Manager options
/// * `chains_dir` - Directory with extra chain descriptors
/// * `specs_dir` - Directory with chain specifications for the light client
pub async fn initialize_manager(
	config: ManagerConfig,
	chains_dir: Option<&Path>,
	specs_dir: Option<&Path>,
) -> Result<ConnectionManager> {
	config.validate()?;

	let registry = Arc::new(load_chain_registry(chains_dir).await?);
	let spec_registry = create_spec_registry(specs_dir);
	let light_runtime = create_light_client_runtime(&config);

	tracing::info!(
		chains = registry.len(),
		light_client = light_runtime.is_some(),
		mode = %config.transport_mode,
		"Connection manager initialized"
	);

	Ok(ConnectionManager::new(
		config,
		registry,
		spec_registry,
		Arc::new(WsConnector::default()),
		light_runtime,
	))
}
