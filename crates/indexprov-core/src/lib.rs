//! # indexprov core
//!
//! Pure primitives for the index provider: content identifiers, peer
//! identities, advertisements and their canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Advertisement`] - A signed announcement of content a provider holds
//! - [`AdBuilder`] - Builds and signs advertisements with extended providers
//! - [`Cid`] / [`Link`] - Content identifiers
//! - [`PeerId`] - A provider identity backed by an Ed25519 key
//!
//! ## Canonicalization
//!
//! Advertisements are encoded using deterministic CBOR. See [`canonical`] module.

pub mod advertisement;
pub mod canonical;
pub mod cid;
pub mod crypto;
pub mod error;
pub mod multibase;
pub mod multihash;
pub mod peer;
pub mod validation;
pub mod varint;
pub mod xproviders;

pub use advertisement::{
    Advertisement, Entries, ExtendedProvider, ExtendedProviderInfo, MAX_CONTEXT_ID_LEN,
    MAX_METADATA_LEN,
};
pub use canonical::{canonical_bytes, canonical_signing_bytes, decode_advertisement};
pub use cid::{Cid, Link};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{BuildError, CoreError, ValidationError};
pub use multihash::{Multihash, MultihashCode, MultihashHasher};
pub use peer::{Multiaddr, PeerId, ProviderId, MAX_INLINE_KEY_LEN};
pub use validation::{validate_advertisement, validate_advertisement_structure};
pub use xproviders::{AdBuilder, AdParams, XpInfo};
