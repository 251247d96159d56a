use proptest::{prelude::*, test_runner::Config};
use std::time::Duration;

use substrate_connect::services::connection::ReconnectPolicy;

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_delays_double_from_base(base_secs in 1u64..30, attempts in 0u32..10) {
		let policy = ReconnectPolicy::new(Duration::from_secs(base_secs), attempts);
		let delays: Vec<Duration> = policy.delays().collect();

		prop_assert_eq!(delays.len(), attempts as usize);
		for (attempt, delay) in delays.iter().enumerate() {
			prop_assert_eq!(*delay, Duration::from_secs(base_secs * 2u64.pow(attempt as u32)));
		}
	}

	#[test]
	fn test_delays_are_bounded(base_ms in 1u64..5_000, attempts in 0u32..16) {
		let policy = ReconnectPolicy::new(Duration::from_millis(base_ms), attempts);
		let delays: Vec<Duration> = policy.delays().collect();

		prop_assert_eq!(delays.len(), attempts as usize);
		if let Some(first) = delays.first() {
			prop_assert_eq!(*first, Duration::from_millis(base_ms));
		}
		prop_assert!(delays.windows(2).all(|w| w[0] <= w[1]));

		// Never more than base * 2^(attempts - 1), give or take float rounding
		let ceiling = Duration::from_millis(base_ms * 2u64.pow(attempts.saturating_sub(1)));
		prop_assert!(delays.iter().all(|d| *d <= ceiling + Duration::from_millis(1)));
	}
}
