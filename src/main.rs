//! Substrate connection manager entry point.
//!
//! Acquires a connection to each requested chain, waits until it delivered its first best block,
//! prints the outcome and releases everything again. Useful to check endpoints, chain specs and
//! configuration without writing any code.
//!
//! # Flow
//! 1. Loads `.env` and applies CLI options to the environment
//! 2. Sets up logging
//! 3. Builds the manager configuration (file, then `SUBSTRATE_*` overrides, then CLI flags)
//! 4. Acquires every requested chain concurrently
//! 5. Shuts the manager down

use std::{
	env::{set_var, var},
	path::PathBuf,
	time::Duration,
};

use clap::Parser;
use dotenvy::dotenv_override;
use futures::future::join_all;
use tracing::{error, info};

use substrate_connect::{
	bootstrap::initialize_manager,
	models::{AcquireOptions, ManagerConfig},
	utils::logging::setup_logging,
};

#[derive(Parser)]
#[command(
	name = "substrate-connect",
	about = "Connects to Substrate chains over WebSocket or an embedded light client and reports their readiness.",
	version
)]
struct Cli {
	/// Chains to connect to (defaults to every known chain)
	#[arg(value_name = "CHAIN_ID")]
	chains: Vec<String>,

	/// Transport to use (socket, light_client)
	#[arg(long, value_name = "MODE")]
	mode: Option<String>,

	/// Readiness timeout in milliseconds
	#[arg(long, value_name = "MS")]
	timeout: Option<u64>,

	/// Manager configuration file (JSON)
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Directory with extra chain descriptors
	#[arg(long, value_name = "PATH")]
	chains_dir: Option<PathBuf>,

	/// Directory with chain specifications (`<chain_id>.json`)
	#[arg(long, value_name = "PATH")]
	specs_dir: Option<PathBuf>,

	/// Write logs to file instead of stdout
	#[arg(long)]
	log_file: bool,

	/// Set log level (trace, debug, info, warn, error)
	#[arg(long, value_name = "LEVEL")]
	log_level: Option<String>,

	/// Path to store log files (default: logs/)
	#[arg(long, value_name = "PATH")]
	log_path: Option<String>,

	/// Maximum log file size in bytes before rolling
	#[arg(long, value_name = "BYTES")]
	log_max_size: Option<u64>,
}

impl Cli {
	/// Apply CLI options to environment variables, overriding any existing values
	fn apply_to_env(&self) {
		// Reload environment variables from .env file
		dotenv_override().ok();

		if self.log_file {
			set_var("LOG_MODE", "file");
		}

		if let Ok(level) = var("RUST_LOG") {
			set_var("LOG_LEVEL", level);
		}

		if let Some(level) = &self.log_level {
			set_var("LOG_LEVEL", level);
			set_var("RUST_LOG", level);
		}

		if let Some(path) = &self.log_path {
			set_var("LOG_DATA_DIR", path);
		}

		if let Some(max_size) = &self.log_max_size {
			set_var("LOG_MAX_SIZE", max_size.to_string());
		}

		if let Some(mode) = &self.mode {
			set_var("SUBSTRATE_TRANSPORT_MODE", mode);
		}

		if let Some(timeout) = &self.timeout {
			set_var("SUBSTRATE_TIMEOUT_MS", timeout.to_string());
		}
	}

	fn manager_config(&self) -> anyhow::Result<ManagerConfig> {
		let config = match &self.config {
			Some(path) => ManagerConfig::load_from_path(path)?,
			None => ManagerConfig::default(),
		};
		Ok(config.with_env_overrides()?)
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.apply_to_env();

	setup_logging().unwrap_or_else(|e| {
		error!("Failed to setup logging: {}", e);
	});

	let config = cli.manager_config()?;
	let timeout = config.timeout();
	let manager = initialize_manager(config, cli.chains_dir.as_deref(), cli.specs_dir.as_deref())
		.await
		.map_err(|e| anyhow::anyhow!("Failed to initialize connection manager: {}", e))?;

	let chains: Vec<String> = if cli.chains.is_empty() {
		manager.registry().all().map(|c| c.id.clone()).collect()
	} else {
		cli.chains.clone()
	};

	let outcomes = join_all(chains.iter().map(|chain_id| {
		let manager = &manager;
		async move {
			let started = tokio::time::Instant::now();
			let outcome = manager
				.acquire(chain_id, AcquireOptions::default().with_timeout(timeout))
				.await;
			(chain_id, outcome, started.elapsed())
		}
	}))
	.await;

	let mut failures = 0;
	for (chain_id, outcome, elapsed) in outcomes {
		match outcome {
			Ok(connection) => {
				let light_chains = connection.light_chain_ids().await;
				let transport = if light_chains.is_empty() {
					connection.client().await.endpoint()
				} else {
					format!("light client ({})", light_chains.join(" -> "))
				};
				println!(
					"{:<24} ready in {:>6}ms via {}",
					chain_id,
					elapsed.as_millis(),
					transport
				);
				manager.release(connection).await;
			}
			Err(e) => {
				failures += 1;
				println!("{:<24} failed: {}", chain_id, e);
			}
		}
	}

	if let Err(e) = tokio::time::timeout(Duration::from_secs(10), manager.shutdown())
		.await
		.map_err(anyhow::Error::from)
		.and_then(|r| r.map_err(anyhow::Error::from))
	{
		error!("Shutdown completed with errors: {}", e);
	}

	info!(chains = chains.len(), failures, "Done");
	if failures > 0 {
		anyhow::bail!("{} of {} chains could not be reached", failures, chains.len());
	}
	Ok(())
}
