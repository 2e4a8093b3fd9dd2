//! Content identifiers (CIDs).
//!
//! Advertisements and content groupings are addressed by CIDs. A [`Link`] is a
//! CID used as a pointer to another content-addressed object.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::multihash::{Multihash, MultihashCode};
use crate::{multibase, varint};

/// Multicodec values for the content types this crate deals with.
pub mod codec {
    /// Raw bytes.
    pub const RAW: u64 = 0x55;
    /// MerkleDAG protobuf (the implicit codec of CIDv0).
    pub const DAG_PB: u64 = 0x70;
    /// MerkleDAG CBOR.
    pub const DAG_CBOR: u64 = 0x71;
    /// libp2p public key.
    pub const LIBP2P_KEY: u64 = 0x72;
}

/// A content identifier, version 0 or 1.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    version: u8,
    codec: u64,
    hash: Multihash,
}

/// A CID pointing at another content-addressed object.
pub type Link = Cid;

impl Cid {
    /// Create a CIDv1.
    pub fn new_v1(codec: u64, hash: Multihash) -> Self {
        Self {
            version: 1,
            codec,
            hash,
        }
    }

    /// Create a CIDv0; only sha2-256 multihashes are allowed.
    pub fn new_v0(hash: Multihash) -> Result<Self, CoreError> {
        if hash.code() != MultihashCode::Sha2_256.code() || hash.digest().len() != 32 {
            return Err(CoreError::InvalidCid("CIDv0 requires a sha2-256 multihash".into()));
        }
        Ok(Self {
            version: 0,
            codec: codec::DAG_PB,
            hash,
        })
    }

    /// CIDv1 dag-cbor over the sha2-256 hash of `data`.
    pub fn dag_cbor_of(data: &[u8]) -> Self {
        Self::new_v1(codec::DAG_CBOR, Multihash::sum(MultihashCode::Sha2_256, data))
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn codec(&self) -> u64 {
        self.codec
    }

    /// The multihash portion of this CID.
    pub fn hash(&self) -> &Multihash {
        &self.hash
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.hash.digest().len() + 8);
        if self.version == 1 {
            varint::encode(1, &mut buf);
            varint::encode(self.codec, &mut buf);
        }
        self.hash.write_bytes(&mut buf);
        buf
    }

    /// Decode a CID from the front of `bytes`, returning bytes consumed.
    pub fn read_bytes(bytes: &[u8]) -> Result<(Self, usize), CoreError> {
        // CIDv0 is a bare sha2-256 multihash: 0x12 0x20 <32 bytes>.
        if bytes.len() >= 2 && bytes[0] == 0x12 && bytes[1] == 0x20 {
            let (hash, used) = Multihash::read_bytes(bytes)?;
            return Ok((Self::new_v0(hash)?, used));
        }

        let (version, n1) = varint::decode(bytes)?;
        if version != 1 {
            return Err(CoreError::InvalidCid(format!("unsupported CID version {}", version)));
        }
        let (codec, n2) = varint::decode(&bytes[n1..])?;
        let (hash, n3) = Multihash::read_bytes(&bytes[n1 + n2..])?;
        Ok((Self::new_v1(codec, hash), n1 + n2 + n3))
    }

    /// Decode a CID that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let (cid, used) = Self::read_bytes(bytes)?;
        if used != bytes.len() {
            return Err(CoreError::InvalidCid("trailing bytes after CID".into()));
        }
        Ok(cid)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            0 => f.write_str(&self.hash.to_b58()),
            _ => write!(f, "b{}", multibase::base32_encode(&self.to_bytes())),
        }
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

impl FromStr for Cid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 46 && s.starts_with("Qm") {
            return Self::from_bytes(&multibase::base58_decode(s)?);
        }
        match s.strip_prefix('b') {
            Some(rest) => Self::from_bytes(&multibase::base32_decode(rest)?),
            None => Err(CoreError::InvalidCid(format!("unsupported multibase in {:?}", s))),
        }
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
