use proptest::{prelude::*, test_runner::Config};

use crate::properties::strategies::{kind_strategy, topology_strategy};
use substrate_connect::{
	repositories::ChainRegistry, utils::tests::builders::chain::ChainDescriptorBuilder,
};

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_every_parachain_resolves_its_relay(chains in topology_strategy()) {
		let registry = ChainRegistry::from_descriptors(chains.clone()).unwrap();

		prop_assert_eq!(registry.len(), chains.len());
		for chain in &chains {
			let found = registry.lookup_by_id(&chain.id).unwrap();
			prop_assert_eq!(found, chain);
			if chain.is_parachain() {
				let relay = registry.relay_of(chain).unwrap();
				prop_assert!(relay.is_relay());
				prop_assert_eq!(Some(relay.id.as_str()), chain.relay_chain_id.as_deref());
			}
		}
	}

	#[test]
	fn test_registry_preserves_order(chains in topology_strategy()) {
		let registry = ChainRegistry::from_descriptors(chains.clone()).unwrap();
		let ids: Vec<&str> = registry.all().map(|c| c.id.as_str()).collect();
		let expected: Vec<&str> = chains.iter().map(|c| c.id.as_str()).collect();
		prop_assert_eq!(ids, expected);
	}

	#[test]
	fn test_duplicates_are_rejected(chains in topology_strategy()) {
		let mut duplicated = chains.clone();
		duplicated.push(chains[0].clone());
		prop_assert!(ChainRegistry::from_descriptors(duplicated).is_err());
	}

	#[test]
	fn test_kind_predicates_are_exclusive(kind in kind_strategy()) {
		let chain = ChainDescriptorBuilder::new().kind(kind).build();
		prop_assert_ne!(ChainRegistry::is_relay(&chain), ChainRegistry::is_parachain(&chain));
		if ChainRegistry::is_system_chain(&chain) {
			prop_assert!(ChainRegistry::is_parachain(&chain));
		}
	}
}
