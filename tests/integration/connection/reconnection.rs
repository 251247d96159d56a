use std::{
	sync::{atomic::Ordering, Arc},
	time::Duration,
};

use substrate_connect::models::{AcquireOptions, ConnectionState, ManagerConfig};

use super::socket_manager;
use crate::integration::mocks::{ReadyBehavior, StubConnector};

fn reconnect_config() -> ManagerConfig {
	ManagerConfig {
		base_backoff_ms: 1_000,
		max_reconnect_attempts: 5,
		probe_interval_ms: 500,
		..ManagerConfig::default()
	}
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_until_attempts_are_exhausted() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(reconnect_config(), connector.clone());
	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	let mut states = connection.subscribe_state();

	connector.down.store(true, Ordering::SeqCst);
	connector.disconnected.store(true, Ordering::SeqCst);

	states
		.wait_for(|state| *state == ConnectionState::Failed)
		.await
		.unwrap();

	// Initial handshake plus five reconnect attempts
	let times = connector.attempt_times();
	assert_eq!(times.len(), 6);
	let gaps: Vec<Duration> = times[1..].windows(2).map(|w| w[1] - w[0]).collect();
	assert_eq!(
		gaps,
		vec![
			Duration::from_secs(2),
			Duration::from_secs(4),
			Duration::from_secs(8),
			Duration::from_secs(16)
		]
	);

	assert_eq!(manager.connection_count().await, 0);
	assert_eq!(connector.client(0).destroys.load(Ordering::SeqCst), 1);

	// No further attempts after giving up
	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(connector.attempt_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connection_is_replaced_on_next_acquire() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(reconnect_config(), connector.clone());
	let first = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	let mut states = first.subscribe_state();

	connector.down.store(true, Ordering::SeqCst);
	connector.disconnected.store(true, Ordering::SeqCst);
	states
		.wait_for(|state| *state == ConnectionState::Failed)
		.await
		.unwrap();

	connector.down.store(false, Ordering::SeqCst);
	let second = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();

	assert_ne!(first.id(), second.id());
	assert_eq!(second.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_recovers_after_outage() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(reconnect_config(), connector.clone());
	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	let mut states = connection.subscribe_state();

	connector.down.store(true, Ordering::SeqCst);
	connector.disconnected.store(true, Ordering::SeqCst);

	states
		.wait_for(|state| *state == ConnectionState::Reconnecting { attempt: 2 })
		.await
		.unwrap();
	connector.down.store(false, Ordering::SeqCst);

	states
		.wait_for(|state| *state == ConnectionState::Connected)
		.await
		.unwrap();

	let old = connector.client(0);
	assert_eq!(old.destroys.load(Ordering::SeqCst), 1);
	let current = connection.client().await;
	assert_eq!(
		Arc::as_ptr(&current) as *const (),
		Arc::as_ptr(&connector.client(1)) as *const ()
	);
	assert_eq!(manager.connection_count().await, 1);

	// The replacement client stays healthy: no further reconnects
	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(connection.state(), ConnectionState::Connected);
	assert_eq!(connector.clients.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_released_connection_is_not_probed() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(reconnect_config(), connector.clone());
	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();

	manager.release(connection.clone()).await;
	connector.disconnected.store(true, Ordering::SeqCst);
	tokio::time::sleep(Duration::from_secs(30)).await;

	assert_eq!(connector.attempt_count(), 1);
	assert_eq!(connection.state(), ConnectionState::Closed);
}
