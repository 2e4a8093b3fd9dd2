//! Building advertisements that carry extended providers.
//!
//! All inputs are passed in one [`AdParams`] value and validated in a single
//! pass by [`AdBuilder::build_and_sign`].

use bytes::Bytes;

use crate::advertisement::{
    Advertisement, Entries, ExtendedProvider, ExtendedProviderInfo, MAX_CONTEXT_ID_LEN,
    MAX_METADATA_LEN,
};
use crate::crypto::{Ed25519Signature, Keypair};
use crate::error::BuildError;
use crate::peer::{Multiaddr, PeerId};

/// An extended provider as supplied by the caller.
///
/// `id` is kept unparsed so a bad identity surfaces as a build error.
#[derive(Debug, Clone)]
pub struct XpInfo {
    pub id: String,
    pub keypair: Keypair,
    pub metadata: Bytes,
    pub addresses: Vec<Multiaddr>,
}

impl XpInfo {
    pub fn new(
        id: impl Into<String>,
        keypair: Keypair,
        metadata: impl Into<Bytes>,
        addresses: Vec<Multiaddr>,
    ) -> Self {
        Self {
            id: id.into(),
            keypair,
            metadata: metadata.into(),
            addresses,
        }
    }

    /// An entry whose id is derived from its own key.
    pub fn for_keypair(keypair: Keypair, metadata: impl Into<Bytes>, addresses: Vec<Multiaddr>) -> Self {
        Self::new(keypair.peer_id().to_string(), keypair, metadata, addresses)
    }
}

/// Everything an advertisement needs besides the main identity.
#[derive(Debug, Clone)]
pub struct AdParams {
    pub extended_providers: Vec<XpInfo>,
    pub override_providers: bool,
    pub context_id: Bytes,
    pub metadata: Bytes,
    pub entries: Entries,
    pub is_rm: bool,
}

impl Default for AdParams {
    fn default() -> Self {
        Self {
            extended_providers: Vec::new(),
            override_providers: false,
            context_id: Bytes::new(),
            metadata: Bytes::new(),
            entries: Entries::NoEntries,
            is_rm: false,
        }
    }
}

/// Builds and signs advertisements for one main provider.
#[derive(Debug, Clone)]
pub struct AdBuilder {
    keypair: Keypair,
    provider: PeerId,
    addresses: Vec<Multiaddr>,
}

struct ParsedEntry<'a> {
    id: PeerId,
    keypair: &'a Keypair,
    addresses: &'a [Multiaddr],
    metadata: &'a Bytes,
}

impl AdBuilder {
    pub fn new(keypair: Keypair, addresses: Vec<Multiaddr>) -> Self {
        let provider = keypair.peer_id();
        Self {
            keypair,
            provider,
            addresses,
        }
    }

    /// The main provider identity.
    pub fn provider(&self) -> PeerId {
        self.provider
    }

    /// Validate `params` and produce a signed advertisement.
    ///
    /// The result has no `previous_id`; the engine links it on publish.
    pub fn build_and_sign(&self, params: AdParams) -> Result<Advertisement, BuildError> {
        if params.override_providers && params.context_id.is_empty() {
            return Err(BuildError::OverrideWithoutContext);
        }
        if params.context_id.len() > MAX_CONTEXT_ID_LEN {
            return Err(BuildError::ContextIdTooLong {
                max: MAX_CONTEXT_ID_LEN,
                got: params.context_id.len(),
            });
        }
        if params.metadata.len() > MAX_METADATA_LEN {
            return Err(BuildError::MetadataTooLong {
                max: MAX_METADATA_LEN,
                got: params.metadata.len(),
            });
        }
        if !params.is_rm && self.addresses.is_empty() {
            return Err(BuildError::EmptyAddresses);
        }

        let mut parsed: Vec<ParsedEntry<'_>> = Vec::with_capacity(params.extended_providers.len() + 1);
        for info in &params.extended_providers {
            if info.addresses.is_empty() {
                return Err(BuildError::EmptyAddresses);
            }
            let id: PeerId = info.id.parse().map_err(|e| BuildError::InvalidIdentity {
                id: info.id.clone(),
                reason: format!("{}", e),
            })?;
            if info.keypair.peer_id() != id {
                return Err(BuildError::IdentityKeyMismatch { id: info.id.clone() });
            }
            if info.metadata.len() > MAX_METADATA_LEN {
                return Err(BuildError::MetadataTooLong {
                    max: MAX_METADATA_LEN,
                    got: info.metadata.len(),
                });
            }
            // First occurrence wins.
            if parsed.iter().any(|p| p.id == id) {
                continue;
            }
            parsed.push(ParsedEntry {
                id,
                keypair: &info.keypair,
                addresses: &info.addresses,
                metadata: &info.metadata,
            });
        }

        // A removal without addresses has nothing to add for the main provider.
        let implicit_main = !params.override_providers && !self.addresses.is_empty();
        if implicit_main && !parsed.iter().any(|p| p.id == self.provider) {
            parsed.push(ParsedEntry {
                id: self.provider,
                keypair: &self.keypair,
                addresses: &self.addresses,
                metadata: &params.metadata,
            });
        }

        let providers = parsed
            .into_iter()
            .map(|p| {
                ExtendedProviderInfo::sign(
                    p.keypair,
                    p.id,
                    p.addresses.to_vec(),
                    p.metadata.clone(),
                    &params.context_id,
                )
            })
            .collect();

        let mut ad = Advertisement {
            previous_id: None,
            provider: self.provider,
            addresses: self.addresses.clone(),
            entries: params.entries,
            context_id: params.context_id,
            metadata: params.metadata,
            is_rm: params.is_rm,
            extended_provider: Some(ExtendedProvider {
                override_providers: params.override_providers,
                providers,
            }),
            signature: Ed25519Signature::ZERO,
        };
        ad.sign(&self.keypair);
        Ok(ad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<Multiaddr> {
        (0..n)
            .map(|i| format!("/ip4/10.0.0.{}/tcp/{}", i + 1, 3000 + i as u16).parse().unwrap())
            .collect()
    }

    #[test]
    fn test_context_id_limit() {
        let builder = AdBuilder::new(Keypair::from_seed(&[1; 32]), addrs(1));
        let err = builder
            .build_and_sign(AdParams {
                context_id: Bytes::from(vec![0u8; MAX_CONTEXT_ID_LEN + 1]),
                ..AdParams::default()
            })
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::ContextIdTooLong {
                max: MAX_CONTEXT_ID_LEN,
                got: MAX_CONTEXT_ID_LEN + 1
            }
        );
    }

    #[test]
    fn test_metadata_limit() {
        let builder = AdBuilder::new(Keypair::from_seed(&[1; 32]), addrs(1));
        let err = builder
            .build_and_sign(AdParams {
                metadata: Bytes::from(vec![0u8; MAX_METADATA_LEN + 1]),
                ..AdParams::default()
            })
            .unwrap_err();
        assert!(matches!(err, BuildError::MetadataTooLong { .. }));
    }

    #[test]
    fn test_identity_must_match_key() {
        let builder = AdBuilder::new(Keypair::from_seed(&[1; 32]), addrs(1));
        let other = Keypair::from_seed(&[2; 32]);
        let wrong_id = Keypair::from_seed(&[3; 32]).peer_id().to_string();
        let err = builder
            .build_and_sign(AdParams {
                extended_providers: vec![XpInfo::new(wrong_id.clone(), other, Bytes::new(), addrs(1))],
                ..AdParams::default()
            })
            .unwrap_err();
        assert_eq!(err, BuildError::IdentityKeyMismatch { id: wrong_id });
    }

    #[test]
    fn test_duplicates_keep_first() {
        let builder = AdBuilder::new(Keypair::from_seed(&[1; 32]), addrs(1));
        let xp = Keypair::from_seed(&[2; 32]);
        let first = XpInfo::for_keypair(xp.clone(), Bytes::from_static(b"first"), addrs(1));
        let second = XpInfo::for_keypair(xp, Bytes::from_static(b"second"), addrs(2));
        let ad = builder
            .build_and_sign(AdParams {
                extended_providers: vec![first, second],
                override_providers: true,
                context_id: Bytes::from_static(b"ctx"),
                ..AdParams::default()
            })
            .unwrap();
        let providers = &ad.extended_provider.unwrap().providers;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].metadata, Bytes::from_static(b"first"));
    }

    #[test]
    fn test_removal_allows_empty_addresses() {
        let builder = AdBuilder::new(Keypair::from_seed(&[1; 32]), Vec::new());
        let ad = builder
            .build_and_sign(AdParams {
                context_id: Bytes::from_static(b"ctx"),
                is_rm: true,
                override_providers: true,
                ..AdParams::default()
            })
            .unwrap();
        assert!(ad.is_rm);
        assert!(ad.addresses.is_empty());

        let err = builder.build_and_sign(AdParams::default()).unwrap_err();
        assert_eq!(err, BuildError::EmptyAddresses);
    }
}
