//! Provider identities and network addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::cid::{codec, Cid};
use crate::crypto::Ed25519PublicKey;
use crate::error::CoreError;
use crate::multibase;
use crate::multihash::{Multihash, MultihashCode};

/// Protobuf prefix of an Ed25519 `PublicKey` message: type field = 1, data field of 32 bytes.
const ED25519_KEY_PREFIX: [u8; 4] = [0x08, 0x01, 0x12, 0x20];

/// A peer identity backed by an Ed25519 public key.
///
/// Only identity-hashed IDs are representable; the key is always recoverable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Derive the identity of a public key.
    pub fn from_public_key(key: Ed25519PublicKey) -> Self {
        Self(key.0)
    }

    /// The public key this identity names.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0)
    }

    /// The identity multihash wrapping the protobuf-encoded key.
    pub fn to_multihash(&self) -> Multihash {
        let mut encoded = Vec::with_capacity(36);
        encoded.extend_from_slice(&ED25519_KEY_PREFIX);
        encoded.extend_from_slice(&self.0);
        Multihash::wrap(MultihashCode::Identity.code(), encoded)
    }

    /// Binary form (the multihash bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_multihash().to_bytes()
    }

    /// Decode the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mh = Multihash::from_bytes(bytes)?;
        Self::from_multihash(&mh)
    }

    /// Recover a peer identity from its multihash.
    pub fn from_multihash(mh: &Multihash) -> Result<Self, CoreError> {
        if mh.code() != MultihashCode::Identity.code() {
            return Err(CoreError::InvalidPeerId(
                "hashed peer ids do not carry a recoverable key".into(),
            ));
        }
        let digest = mh.digest();
        if digest.len() != 36 || digest[..4] != ED25519_KEY_PREFIX {
            return Err(CoreError::InvalidPeerId("not an Ed25519 public key".into()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest[4..]);
        Ok(Self(key))
    }

    /// CIDv1 (libp2p-key) form of this identity.
    pub fn to_cid(&self) -> Cid {
        Cid::new_v1(codec::LIBP2P_KEY, self.to_multihash())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_multihash().to_b58())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl FromStr for PeerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_multihash(&decode_peer_multihash(s)?)
    }
}

/// Decode the textual forms of a peer id to its multihash: legacy base58
/// (`Qm…`, `1…`) or a multibase CIDv1 with the libp2p-key codec.
fn decode_peer_multihash(s: &str) -> Result<Multihash, CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidPeerId("empty".into()));
    }
    if s.starts_with('1') || s.starts_with("Qm") {
        let bytes =
            multibase::base58_decode(s).map_err(|e| CoreError::InvalidPeerId(e.to_string()))?;
        return Multihash::from_bytes(&bytes).map_err(|e| CoreError::InvalidPeerId(e.to_string()));
    }
    if s.starts_with('b') {
        let cid: Cid = s
            .parse()
            .map_err(|e: CoreError| CoreError::InvalidPeerId(e.to_string()))?;
        if cid.codec() != codec::LIBP2P_KEY {
            return Err(CoreError::InvalidPeerId(format!(
                "CID codec {:#x} is not libp2p-key",
                cid.codec()
            )));
        }
        return Ok(cid.hash().clone());
    }
    Err(CoreError::InvalidPeerId(format!("unrecognized encoding: {:?}", s)))
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Longest protobuf-encoded key libp2p inlines with the identity hash.
pub const MAX_INLINE_KEY_LEN: usize = 42;

/// Any libp2p peer identity, whatever its key type.
///
/// Keys of at most [`MAX_INLINE_KEY_LEN`] bytes are inlined with the identity
/// hash; longer ones (RSA) are sha2-256 hashed. The key is not necessarily
/// recoverable, so this only names a peer. Equality is by multihash bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(Multihash);

impl ProviderId {
    pub fn from_multihash(mh: Multihash) -> Result<Self, CoreError> {
        match MultihashCode::from_code(mh.code()) {
            Some(MultihashCode::Identity)
                if !mh.digest().is_empty() && mh.digest().len() <= MAX_INLINE_KEY_LEN =>
            {
                Ok(Self(mh))
            }
            Some(MultihashCode::Identity) => Err(CoreError::InvalidPeerId(format!(
                "inline key of {} bytes",
                mh.digest().len()
            ))),
            Some(MultihashCode::Sha2_256) if mh.digest().len() == 32 => Ok(Self(mh)),
            _ => Err(CoreError::InvalidPeerId(format!(
                "multihash code {:#x} with {} byte digest is not a peer id",
                mh.code(),
                mh.digest().len()
            ))),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mh = Multihash::from_bytes(bytes).map_err(|e| CoreError::InvalidPeerId(e.to_string()))?;
        Self::from_multihash(mh)
    }

    pub fn multihash(&self) -> &Multihash {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// The Ed25519 identity, when this id inlines an Ed25519 key.
    pub fn to_peer_id(&self) -> Option<PeerId> {
        PeerId::from_multihash(&self.0).ok()
    }
}

impl From<PeerId> for ProviderId {
    fn from(peer: PeerId) -> Self {
        Self(peer.to_multihash())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_b58())
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({})", self)
    }
}

impl FromStr for ProviderId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_multihash(decode_peer_multihash(s)?)
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A textual multiaddr such as `/ip4/127.0.0.1/tcp/3104`.
///
/// Only the framing is checked: a leading `/` and no empty segments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multiaddr(String);

impl Multiaddr {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Multiaddr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| CoreError::InvalidMultiaddr(format!("{:?} must start with '/'", s)))?;
        if rest.is_empty() || rest.split('/').any(str::is_empty) {
            return Err(CoreError::InvalidMultiaddr(format!("{:?} has empty segments", s)));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({})", self.0)
    }
}

impl Serialize for Multiaddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Multiaddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_peer_id_string_form() {
        let peer = Keypair::from_seed(&[0x11; 32]).peer_id();
        let s = peer.to_string();
        assert!(s.starts_with("12D3KooW"), "got {}", s);
        assert_eq!(s.parse::<PeerId>().unwrap(), peer);
    }

    #[test]
    fn test_peer_id_cid_form_equals_base58_form() {
        let peer = Keypair::from_seed(&[0x22; 32]).peer_id();
        let cid_form = peer.to_cid().to_string();
        assert!(cid_form.starts_with("bafz"), "got {}", cid_form);
        assert_eq!(cid_form.parse::<PeerId>().unwrap(), peer);
    }

    #[test]
    fn test_peer_id_rejects_garbage() {
        assert!("".parse::<PeerId>().is_err());
        assert!("not-a-peer".parse::<PeerId>().is_err());
        // A sha2-256 multihash is a hashed peer id; no key to recover.
        let hashed = Multihash::sum(MultihashCode::Sha2_256, b"key").to_b58();
        assert!(hashed.parse::<PeerId>().is_err());
        // A dag-cbor CID is not a peer id.
        assert!(Cid::dag_cbor_of(b"x").to_string().parse::<PeerId>().is_err());
    }

    #[test]
    fn test_peer_id_bytes() {
        let peer = Keypair::from_seed(&[0x33; 32]).peer_id();
        let bytes = peer.to_bytes();
        assert_eq!(&bytes[..6], &[0x00, 0x24, 0x08, 0x01, 0x12, 0x20]);
        assert_eq!(PeerId::from_bytes(&bytes).unwrap(), peer);
    }

    const RSA_PEER: &str = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N";
    const SECP256K1_PEER: &str = "16Uiu2HAmLhLvBoYaoZfaMUKuibM6ac163GwKY74c5kiSLg5KvLpY";

    #[test]
    fn test_provider_id_accepts_any_key_type() {
        let rsa: ProviderId = RSA_PEER.parse().unwrap();
        assert_eq!(rsa.multihash().code(), MultihashCode::Sha2_256.code());
        assert_eq!(rsa.to_string(), RSA_PEER);
        assert!(rsa.to_peer_id().is_none());

        let secp: ProviderId = SECP256K1_PEER.parse().unwrap();
        assert_eq!(secp.multihash().code(), MultihashCode::Identity.code());
        assert_eq!(secp.to_string(), SECP256K1_PEER);
        assert!(secp.to_peer_id().is_none());

        // Neither carries a recoverable Ed25519 key.
        assert!(RSA_PEER.parse::<PeerId>().is_err());
        assert!(SECP256K1_PEER.parse::<PeerId>().is_err());
    }

    #[test]
    fn test_provider_id_equals_ed25519_peer_in_any_form() {
        let peer = Keypair::from_seed(&[0x44; 32]).peer_id();
        let from_b58: ProviderId = peer.to_string().parse().unwrap();
        let from_cid: ProviderId = peer.to_cid().to_string().parse().unwrap();
        assert_eq!(from_b58, ProviderId::from(peer));
        assert_eq!(from_cid, from_b58);
        assert_eq!(from_b58.to_peer_id(), Some(peer));
        assert_ne!(from_b58, RSA_PEER.parse::<ProviderId>().unwrap());
    }

    #[test]
    fn test_provider_id_rejects_non_peer_multihashes() {
        assert!("".parse::<ProviderId>().is_err());
        assert!("not-a-peer".parse::<ProviderId>().is_err());
        let blake = Multihash::sum(MultihashCode::Blake3, b"key");
        assert!(ProviderId::from_multihash(blake).is_err());
        let short = Multihash::wrap(MultihashCode::Sha2_256.code(), vec![0u8; 20]);
        assert!(ProviderId::from_multihash(short).is_err());
        let long_inline = Multihash::wrap(MultihashCode::Identity.code(), vec![1u8; 43]);
        assert!(ProviderId::from_multihash(long_inline).is_err());
        assert!(Cid::dag_cbor_of(b"x").to_string().parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_multiaddr_validation() {
        assert!("/ip4/127.0.0.1/tcp/3104".parse::<Multiaddr>().is_ok());
        assert!("ip4/127.0.0.1".parse::<Multiaddr>().is_err());
        assert!("/".parse::<Multiaddr>().is_err());
        assert!("/ip4//tcp/1".parse::<Multiaddr>().is_err());
        assert!("".parse::<Multiaddr>().is_err());
    }
}
