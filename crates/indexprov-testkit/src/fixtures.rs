//! Test fixtures for common scenarios.

use bytes::Bytes;
use rand::Rng;

use indexprov_core::cid::codec;
use indexprov_core::{
    AdBuilder, AdParams, Advertisement, Cid, Entries, Keypair, Link, Multiaddr, Multihash,
    MultihashCode, PeerId, XpInfo,
};
use indexprov_store::MemoryDatastore;
use indexprov_supplier::CarSupplier;

/// A provider identity with its listen addresses.
pub struct TestFixture {
    pub keypair: Keypair,
    pub addresses: Vec<Multiaddr>,
}

impl TestFixture {
    /// A random identity with two random addresses.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
            addresses: random_multiaddrs(2),
        }
    }

    /// A deterministic identity. Addresses are still derived from the seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let port = u16::from_le_bytes([seed[0], seed[1]]);
        Self {
            keypair: Keypair::from_seed(&seed),
            addresses: vec![multiaddr(port)],
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.keypair.peer_id()
    }

    pub fn builder(&self) -> AdBuilder {
        AdBuilder::new(self.keypair.clone(), self.addresses.clone())
    }

    /// This identity as an extended provider entry.
    pub fn xp_info(&self, metadata: impl Into<Bytes>) -> XpInfo {
        XpInfo::for_keypair(self.keypair.clone(), metadata, self.addresses.clone())
    }

    /// A signed advertisement for `entries` under `context_id`.
    pub fn make_ad(&self, context_id: &[u8], entries: Link) -> Advertisement {
        self.builder()
            .build_and_sign(AdParams {
                context_id: Bytes::copy_from_slice(context_id),
                metadata: Bytes::from_static(b"test-metadata"),
                entries: Entries::Link(entries),
                ..AdParams::default()
            })
            .expect("fixture parameters are valid")
    }

    /// A signed removal advertisement for `context_id`.
    pub fn make_removal(&self, context_id: &[u8]) -> Advertisement {
        self.builder()
            .build_and_sign(AdParams {
                context_id: Bytes::copy_from_slice(context_id),
                is_rm: true,
                ..AdParams::default()
            })
            .expect("fixture parameters are valid")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple deterministic identities.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0xAA;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// A TCP multiaddr on localhost.
pub fn multiaddr(port: u16) -> Multiaddr {
    format!("/ip4/127.0.0.1/tcp/{}", port)
        .parse()
        .expect("static multiaddr shape")
}

/// `n` addresses on random ports.
pub fn random_multiaddrs(n: usize) -> Vec<Multiaddr> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| multiaddr(rng.gen_range(1024..u16::MAX))).collect()
}

/// An extended provider with a fresh identity, random metadata and `addrs` addresses.
pub fn random_xp_info(addrs: usize) -> XpInfo {
    let mut rng = rand::thread_rng();
    let metadata: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    XpInfo::for_keypair(Keypair::generate(), metadata, random_multiaddrs(addrs))
}

/// `n` random sha2-256 multihashes.
pub fn random_multihashes(n: usize) -> Vec<Multihash> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let data: [u8; 32] = rng.gen();
            Multihash::sum(MultihashCode::Sha2_256, &data)
        })
        .collect()
}

/// A random raw-codec CID, usable as an entries link.
pub fn random_link() -> Cid {
    let data: [u8; 32] = rand::thread_rng().gen();
    Cid::new_v1(codec::RAW, Multihash::sum(MultihashCode::Sha2_256, &data))
}

/// Hex encoding of a peer's public key, for test diagnostics.
pub fn peer_hex(peer: &PeerId) -> String {
    hex::encode(peer.public_key().as_bytes())
}

/// A supplier over a fresh in-memory datastore.
pub fn memory_supplier() -> CarSupplier<MemoryDatastore> {
    CarSupplier::new(MemoryDatastore::new())
}
