use proptest::prelude::*;

use substrate_connect::{
	models::{ChainDescriptor, ChainKind},
	utils::tests::builders::chain::ChainDescriptorBuilder,
};

const MAX_PARACHAINS: usize = 8;

pub fn chain_id_strategy() -> impl Strategy<Value = String> {
	"[a-z][a-z0-9_]{0,15}"
}

/// A relay chain with up to `MAX_PARACHAINS` parachains, ids unique
pub fn topology_strategy() -> impl Strategy<Value = Vec<ChainDescriptor>> {
	(
		chain_id_strategy(),
		prop::collection::hash_set(chain_id_strategy(), 0..MAX_PARACHAINS),
		any::<bool>(),
	)
		.prop_map(|(relay, parachains, system)| {
			let mut chains = vec![ChainDescriptorBuilder::new().relay(&relay).build()];
			for (index, id) in parachains.into_iter().filter(|id| *id != relay).enumerate() {
				let builder = if system {
					ChainDescriptorBuilder::new().system_parachain(&id, &relay, 1000 + index as u32)
				} else {
					ChainDescriptorBuilder::new().parachain(&id, &relay, 2000 + index as u32)
				};
				chains.push(builder.build());
			}
			chains
		})
}

pub fn kind_strategy() -> impl Strategy<Value = ChainKind> {
	prop_oneof![
		Just(ChainKind::Relay),
		Just(ChainKind::SystemParachain),
		Just(ChainKind::Parachain),
	]
}
