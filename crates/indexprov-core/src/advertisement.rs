//! Advertisement: a signed announcement of content a provider holds.
//!
//! An advertisement is immutable once signed. Advertisements from one provider
//! form a chain through `previous_id`; the chain head is owned by the engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_bytes, canonical_signing_bytes, xp_signing_bytes};
use crate::cid::Link;
use crate::crypto::{Ed25519Signature, Keypair};
use crate::error::{CoreError, ValidationError};
use crate::peer::{Multiaddr, PeerId};

/// Domain separator prefixed to the advertisement signing bytes.
pub const SIGN_DOMAIN: &[u8] = b"indexprov/advertisement/v1";

/// Domain separator prefixed to extended provider entry signing bytes.
pub const XP_SIGN_DOMAIN: &[u8] = b"indexprov/extended-provider/v1";

/// Maximum context id length in bytes.
pub const MAX_CONTEXT_ID_LEN: usize = 64;

/// Maximum metadata length in bytes.
pub const MAX_METADATA_LEN: usize = 1024;

/// What an advertisement points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entries {
    /// No entry chain: removal ads and metadata-only updates.
    NoEntries,
    /// Link to the head of an entry chain.
    Link(Link),
}

impl Entries {
    pub fn is_none(&self) -> bool {
        matches!(self, Entries::NoEntries)
    }

    pub fn link(&self) -> Option<&Link> {
        match self {
            Entries::NoEntries => None,
            Entries::Link(link) => Some(link),
        }
    }
}

/// An additional provider that can serve the same content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProviderInfo {
    pub id: PeerId,

    /// Never empty.
    pub addresses: Vec<Multiaddr>,

    /// May be empty.
    pub metadata: Bytes,

    /// Signature by `id`'s key over (id, context id, metadata).
    pub signature: Ed25519Signature,
}

impl ExtendedProviderInfo {
    /// Sign a new entry with the entry's own key.
    pub fn sign(
        keypair: &Keypair,
        id: PeerId,
        addresses: Vec<Multiaddr>,
        metadata: Bytes,
        context_id: &[u8],
    ) -> Self {
        let message = signed_xp_message(&id, context_id, &metadata);
        Self {
            id,
            addresses,
            signature: keypair.sign(&message),
            metadata,
        }
    }

    /// Check the entry signature against the entry's own identity.
    pub fn verify(&self, context_id: &[u8]) -> Result<(), CoreError> {
        let message = signed_xp_message(&self.id, context_id, &self.metadata);
        self.id.public_key().verify(&message, &self.signature)
    }
}

/// Extended provider section of an advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProvider {
    /// When set, `providers` replaces any earlier list for the same context id.
    pub override_providers: bool,

    pub providers: Vec<ExtendedProviderInfo>,
}

/// A signed advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Link to the previous advertisement (None only for the first in a chain).
    pub previous_id: Option<Link>,

    pub provider: PeerId,

    /// Non-empty unless `is_rm`.
    pub addresses: Vec<Multiaddr>,

    pub entries: Entries,

    pub context_id: Bytes,

    /// Opaque to this crate.
    pub metadata: Bytes,

    /// Retracts the content published under `context_id`.
    pub is_rm: bool,

    pub extended_provider: Option<ExtendedProvider>,

    /// Signature over `SIGN_DOMAIN || canonical_signing_bytes`.
    pub signature: Ed25519Signature,
}

impl Advertisement {
    /// Compute the advertisement link (CIDv1 dag-cbor of the canonical bytes).
    pub fn link(&self) -> Link {
        Link::dag_cbor_of(&canonical_bytes(self))
    }

    /// Sign (or re-sign) the advertisement in place.
    pub fn sign(&mut self, keypair: &Keypair) {
        self.signature = keypair.sign(&signed_message(self));
    }

    /// Verify the main signature and return the signer's identity.
    pub fn verify_signature(&self) -> Result<PeerId, CoreError> {
        self.provider
            .public_key()
            .verify(&signed_message(self), &self.signature)?;
        Ok(self.provider)
    }

    /// Verify every extended provider entry signature.
    pub fn verify_extended_signatures(&self) -> Result<(), ValidationError> {
        let Some(xp) = &self.extended_provider else {
            return Ok(());
        };
        for info in &xp.providers {
            info.verify(&self.context_id)
                .map_err(|_| ValidationError::ExtendedSignatureFailed(info.id.to_string()))?;
        }
        Ok(())
    }

    /// Whether this is a removal advertisement.
    pub fn is_removal(&self) -> bool {
        self.is_rm
    }
}

/// The message covered by an advertisement signature.
pub fn signed_message(ad: &Advertisement) -> Vec<u8> {
    let body = canonical_signing_bytes(ad);
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + body.len());
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(&body);
    buf
}

fn signed_xp_message(id: &PeerId, context_id: &[u8], metadata: &[u8]) -> Vec<u8> {
    let body = xp_signing_bytes(id, context_id, metadata);
    let mut buf = Vec::with_capacity(XP_SIGN_DOMAIN.len() + body.len());
    buf.extend_from_slice(XP_SIGN_DOMAIN);
    buf.extend_from_slice(&body);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    fn signed_ad(keypair: &Keypair) -> Advertisement {
        let mut ad = Advertisement {
            previous_id: None,
            provider: keypair.peer_id(),
            addresses: vec![addr("/ip4/10.0.0.1/tcp/3104")],
            entries: Entries::Link(Link::dag_cbor_of(b"entries")),
            context_id: Bytes::from_static(b"ctx"),
            metadata: Bytes::from_static(b"meta"),
            is_rm: false,
            extended_provider: None,
            signature: Ed25519Signature::ZERO,
        };
        ad.sign(keypair);
        ad
    }

    #[test]
    fn test_verify_signature_returns_provider() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let ad = signed_ad(&keypair);
        assert_eq!(ad.verify_signature().unwrap(), keypair.peer_id());
    }

    #[test]
    fn test_tampered_ad_fails_verification() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let mut ad = signed_ad(&keypair);
        ad.metadata = Bytes::from_static(b"other");
        assert!(matches!(ad.verify_signature(), Err(CoreError::InvalidSignature)));
    }

    #[test]
    fn test_previous_id_is_covered_by_signature() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let mut ad = signed_ad(&keypair);
        ad.previous_id = Some(Link::dag_cbor_of(b"prev"));
        assert!(ad.verify_signature().is_err());
    }

    #[test]
    fn test_link_changes_with_signature() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let ad = signed_ad(&keypair);
        let mut other = ad.clone();
        other.signature = Ed25519Signature::ZERO;
        assert_ne!(ad.link(), other.link());
        assert_eq!(ad.link(), ad.clone().link());
    }

    #[test]
    fn test_extended_signature_bound_to_context() {
        let xp_key = Keypair::from_seed(&[2; 32]);
        let info = ExtendedProviderInfo::sign(
            &xp_key,
            xp_key.peer_id(),
            vec![addr("/ip4/10.0.0.2/tcp/1")],
            Bytes::new(),
            b"ctx-a",
        );
        assert!(info.verify(b"ctx-a").is_ok());
        assert!(info.verify(b"ctx-b").is_err());
    }
}
