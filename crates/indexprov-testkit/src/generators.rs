//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use indexprov_core::cid::codec;
use indexprov_core::{
    AdBuilder, AdParams, Cid, Entries, Keypair, Multiaddr, Multihash, MultihashCode, PeerId,
    XpInfo, MAX_CONTEXT_ID_LEN, MAX_METADATA_LEN,
};

use crate::fixtures::multiaddr;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random PeerId.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    keypair().prop_map(|kp| kp.peer_id())
}

/// Generate a non-empty list of localhost addresses.
pub fn multiaddrs(max: usize) -> impl Strategy<Value = Vec<Multiaddr>> {
    prop::collection::vec(1024u16..=u16::MAX, 1..=max.max(1))
        .prop_map(|ports| ports.into_iter().map(multiaddr).collect())
}

/// Generate a non-empty context id within the size limit.
pub fn context_id() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=MAX_CONTEXT_ID_LEN)
}

/// Generate metadata bytes of specified max length.
pub fn metadata(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len.min(MAX_METADATA_LEN))
}

/// Generate a sha2-256 multihash of random content.
pub fn multihash() -> impl Strategy<Value = Multihash> {
    any::<[u8; 32]>().prop_map(|data| Multihash::sum(MultihashCode::Sha2_256, &data))
}

/// Generate a raw-codec CID.
pub fn link() -> impl Strategy<Value = Cid> {
    multihash().prop_map(|mh| Cid::new_v1(codec::RAW, mh))
}

/// Generate a well-formed extended provider whose id matches its key.
pub fn xp_info() -> impl Strategy<Value = XpInfo> {
    (keypair(), metadata(64), multiaddrs(3))
        .prop_map(|(kp, meta, addrs)| XpInfo::for_keypair(kp, meta, addrs))
}

/// Valid inputs for [`AdBuilder::build_and_sign`].
#[derive(Debug, Clone)]
pub struct BuildInput {
    pub keypair: Keypair,
    pub addresses: Vec<Multiaddr>,
    pub extended_providers: Vec<XpInfo>,
    pub override_providers: bool,
    pub context_id: Vec<u8>,
    pub metadata: Vec<u8>,
    pub entries: Cid,
}

impl BuildInput {
    pub fn builder(&self) -> AdBuilder {
        AdBuilder::new(self.keypair.clone(), self.addresses.clone())
    }

    pub fn params(&self) -> AdParams {
        AdParams {
            extended_providers: self.extended_providers.clone(),
            override_providers: self.override_providers,
            context_id: Bytes::from(self.context_id.clone()),
            metadata: Bytes::from(self.metadata.clone()),
            entries: Entries::Link(self.entries.clone()),
            is_rm: false,
        }
    }

    /// Whether the main identity is among the supplied extended providers.
    pub fn main_supplied(&self) -> bool {
        let main = self.keypair.peer_id().to_string();
        self.extended_providers.iter().any(|xp| xp.id == main)
    }

    /// Supplied extended providers with duplicate ids removed.
    pub fn distinct_extended(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.extended_providers
            .iter()
            .filter(|xp| seen.insert(xp.id.clone()))
            .count()
    }
}

impl Arbitrary for BuildInput {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            multiaddrs(3),
            prop::collection::vec(xp_info(), 0..4),
            any::<bool>(), // override
            context_id(),
            metadata(128),
            link(),
            any::<bool>(), // list the main identity explicitly
        )
            .prop_map(
                |(kp, addrs, mut xps, override_providers, ctx, meta, entries, include_main)| {
                    if include_main {
                        xps.push(XpInfo::for_keypair(
                            kp.clone(),
                            b"supplied-main".to_vec(),
                            vec![multiaddr(4001)],
                        ));
                    }
                    BuildInput {
                        keypair: kp,
                        addresses: addrs,
                        extended_providers: xps,
                        override_providers,
                        context_id: ctx,
                        metadata: meta,
                        entries,
                    }
                },
            )
            .boxed()
    }
}
