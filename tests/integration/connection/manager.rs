use std::{sync::atomic::Ordering, sync::Arc, time::Duration};

use substrate_connect::{
	models::{AcquireOptions, ConnectionState, ManagerConfig, TransportMode},
	services::connection::{ConnectionError, TransportError},
};

use super::socket_manager;
use crate::integration::mocks::{ReadyBehavior, StubConnector};

#[tokio::test]
async fn test_concurrent_acquires_share_one_connection() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let handles = futures::future::join_all(
		(0..10).map(|_| manager.acquire("west", AcquireOptions::default())),
	)
	.await;

	let first = handles[0].as_ref().unwrap();
	assert!(handles
		.iter()
		.all(|h| Arc::ptr_eq(h.as_ref().unwrap(), first)));
	assert_eq!(connector.attempt_count(), 1);
	assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn test_transport_modes_are_cached_separately() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let socket = manager
		.acquire("west", AcquireOptions::socket())
		.await
		.unwrap();
	// Without a light-client runtime this falls back to a second socket connection
	let light = manager
		.acquire("west", AcquireOptions::light_client())
		.await
		.unwrap();

	assert!(!Arc::ptr_eq(&socket, &light));
	assert_eq!(light.key().mode, TransportMode::LightClient);
	assert!(light.light_chain_ids().await.is_empty());
	assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test]
async fn test_unknown_chain_fails_without_io() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let err = manager
		.acquire("rococo", AcquireOptions::default())
		.await
		.unwrap_err();

	assert!(matches!(err, ConnectionError::ChainNotFound(_)));
	assert_eq!(connector.attempt_count(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoints_are_not_cached() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	connector.down.store(true, Ordering::SeqCst);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let err = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap_err();
	assert!(matches!(err, ConnectionError::AllEndpointsUnreachable(_)));
	assert_eq!(manager.connection_count().await, 0);

	connector.down.store(false, Ordering::SeqCst);
	manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_cancels_subscription() {
	let connector = StubConnector::new(ReadyBehavior::Never);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let started = tokio::time::Instant::now();
	let err = manager
		.acquire(
			"west",
			AcquireOptions::default().with_timeout(Duration::from_secs(2)),
		)
		.await
		.unwrap_err();

	assert!(matches!(err, ConnectionError::ConnectionTimeout(_)));
	assert!(started.elapsed() >= Duration::from_secs(2));
	assert!(started.elapsed() < Duration::from_secs(3));

	let client = connector.client(0);
	assert_eq!(client.live_subscriptions.load(Ordering::SeqCst), 0);
	assert_eq!(client.destroys.load(Ordering::SeqCst), 1);
	assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_joining_caller_keeps_its_own_timeout() {
	let connector = StubConnector::new(ReadyBehavior::Never);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());
	let started = tokio::time::Instant::now();

	let (creator, (joiner, joiner_elapsed, alive_after_joiner)) = tokio::join!(
		manager.acquire("west", AcquireOptions::default()),
		async {
			let outcome = manager
				.acquire(
					"west",
					AcquireOptions::default().with_timeout(Duration::from_millis(100)),
				)
				.await;
			(outcome, started.elapsed(), manager.connection_count().await)
		}
	);

	assert!(matches!(joiner, Err(ConnectionError::ConnectionTimeout(_))));
	assert!(joiner_elapsed < Duration::from_secs(1));
	// The shorter timeout does not tear down the shared connection
	assert_eq!(alive_after_joiner, 1);

	assert!(matches!(creator, Err(ConnectionError::ConnectionTimeout(_))));
	assert!(started.elapsed() >= Duration::from_secs(30));
	assert_eq!(connector.attempt_count(), 1);
	assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_joining_caller_with_longer_timeout_shares_the_outcome() {
	let connector = StubConnector::new(ReadyBehavior::Never);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());
	let started = tokio::time::Instant::now();

	let (creator, joiner) = tokio::join!(
		manager.acquire(
			"west",
			AcquireOptions::default().with_timeout(Duration::from_secs(1)),
		),
		manager.acquire(
			"west",
			AcquireOptions::default().with_timeout(Duration::from_secs(60)),
		)
	);

	assert!(matches!(creator, Err(ConnectionError::ConnectionTimeout(_))));
	assert!(matches!(joiner, Err(ConnectionError::ConnectionTimeout(_))));
	assert!(started.elapsed() < Duration::from_secs(2));
	assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test]
async fn test_stream_ending_before_first_block_rejects() {
	let connector = StubConnector::new(ReadyBehavior::EndStream);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let err = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		ConnectionError::Transport(TransportError::StreamClosed(_))
	));
	assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn test_skip_ready_returns_before_first_block() {
	let connector = StubConnector::new(ReadyBehavior::Never);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let connection = manager
		.acquire("west", AcquireOptions::default().without_ready_wait())
		.await
		.unwrap();
	assert_eq!(connection.state(), ConnectionState::Connected);
	manager.release(connection).await;
}

#[tokio::test]
async fn test_disconnect_evicts_and_reacquire_creates_new_connection() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let first = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	manager.disconnect(&first).await.unwrap();

	assert_eq!(manager.connection_count().await, 0);
	assert_eq!(first.state(), ConnectionState::Closed);
	assert_eq!(connector.client(0).destroys.load(Ordering::SeqCst), 1);

	let second = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	assert_ne!(first.id(), second.id());
	assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test]
async fn test_concurrent_disconnects_tear_down_once() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());
	let connection = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();

	let outcomes =
		futures::future::join_all((0..8).map(|_| manager.disconnect(&connection))).await;
	assert!(outcomes.iter().all(Result::is_ok));

	// Repeated release after disconnect is a no-op
	manager.release(connection.clone()).await;
	manager.release(connection.clone()).await;

	assert_eq!(connector.client(0).destroys.load(Ordering::SeqCst), 1);
	assert!(connection.is_closed());
}

#[tokio::test]
async fn test_stale_disconnect_keeps_newer_entry() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let first = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	manager.release(first.clone()).await;
	let second = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();

	// Tearing the old connection down again must not evict the new one
	manager.release(first).await;
	assert_eq!(manager.connection_count().await, 1);
	assert!(!second.is_closed());
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
	let connector = StubConnector::new(ReadyBehavior::Immediate);
	let manager = socket_manager(ManagerConfig::default(), connector.clone());

	let west = manager
		.acquire("west", AcquireOptions::default())
		.await
		.unwrap();
	let hub = manager
		.acquire("west_asset_hub", AcquireOptions::default())
		.await
		.unwrap();

	manager.shutdown().await.unwrap();

	assert!(west.is_closed());
	assert!(hub.is_closed());
	assert_eq!(manager.connection_count().await, 0);
}
