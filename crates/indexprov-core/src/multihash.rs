//! Multihash: a self-describing hash digest.
//!
//! Binary form is `varint(code) || varint(len) || digest`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::{multibase, varint};

/// Hash functions this crate can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultihashCode {
    /// The digest is the input itself.
    Identity,
    /// SHA2-256, 32-byte digest.
    Sha2_256,
    /// BLAKE3, 32-byte digest.
    Blake3,
}

impl MultihashCode {
    /// The multicodec table value.
    pub const fn code(self) -> u64 {
        match self {
            Self::Identity => 0x00,
            Self::Sha2_256 => 0x12,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up a supported hash function by its multicodec value.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x00 => Some(Self::Identity),
            0x12 => Some(Self::Sha2_256),
            0x1e => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A multihash value.
///
/// Any code is accepted when decoding; only [`MultihashCode`] functions can be
/// computed locally.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multihash {
    code: u64,
    digest: Vec<u8>,
}

impl Multihash {
    /// Wrap an existing digest.
    pub fn wrap(code: u64, digest: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            digest: digest.into(),
        }
    }

    /// Hash `data` with the given function.
    pub fn sum(code: MultihashCode, data: &[u8]) -> Self {
        let mut hasher = MultihashHasher::new(code);
        hasher.update(data);
        hasher.finalize()
    }

    /// The hash function code.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// The raw digest.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.digest.len() + 4);
        self.write_bytes(&mut buf);
        buf
    }

    /// Append the binary form to `buf`.
    pub fn write_bytes(&self, buf: &mut Vec<u8>) {
        varint::encode(self.code, buf);
        varint::encode(self.digest.len() as u64, buf);
        buf.extend_from_slice(&self.digest);
    }

    /// Decode a multihash from the front of `bytes`, returning bytes consumed.
    pub fn read_bytes(bytes: &[u8]) -> Result<(Self, usize), CoreError> {
        let (code, n1) = varint::decode(bytes)?;
        let (len, n2) = varint::decode(&bytes[n1..])?;
        let start = n1 + n2;
        let end = start
            .checked_add(len as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| CoreError::DecodingError("multihash digest truncated".into()))?;
        Ok((Self::wrap(code, &bytes[start..end]), end))
    }

    /// Decode a multihash that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let (mh, used) = Self::read_bytes(bytes)?;
        if used != bytes.len() {
            return Err(CoreError::DecodingError("trailing bytes after multihash".into()));
        }
        Ok(mh)
    }

    /// base58btc string form.
    pub fn to_b58(&self) -> String {
        multibase::base58_encode(&self.to_bytes())
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_b58())
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({:#x}, {})", self.code, hex::encode(&self.digest))
    }
}

impl FromStr for Multihash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&multibase::base58_decode(s)?)
    }
}

/// Incremental hasher producing a [`Multihash`].
pub enum MultihashHasher {
    Identity(Vec<u8>),
    Sha2_256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl MultihashHasher {
    /// Start hashing with the given function.
    pub fn new(code: MultihashCode) -> Self {
        match code {
            MultihashCode::Identity => Self::Identity(Vec::new()),
            MultihashCode::Sha2_256 => Self::Sha2_256(Sha256::new()),
            MultihashCode::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Feed more input.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Identity(buf) => buf.extend_from_slice(data),
            Self::Sha2_256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Finish and produce the multihash.
    pub fn finalize(self) -> Multihash {
        match self {
            Self::Identity(buf) => Multihash::wrap(MultihashCode::Identity.code(), buf),
            Self::Sha2_256(h) => {
                Multihash::wrap(MultihashCode::Sha2_256.code(), h.finalize().to_vec())
            }
            Self::Blake3(h) => {
                Multihash::wrap(MultihashCode::Blake3.code(), h.finalize().as_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_multihash_bytes() {
        let mh = Multihash::sum(MultihashCode::Sha2_256, b"hello");
        let bytes = mh.to_bytes();
        assert_eq!(&bytes[..2], &[0x12, 0x20]);
        assert_eq!(bytes.len(), 34);
        assert_eq!(
            hex::encode(mh.digest()),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha256_multihash_is_qm_prefixed() {
        let mh = Multihash::sum(MultihashCode::Sha2_256, b"block");
        assert!(mh.to_string().starts_with("Qm"));
        let parsed: Multihash = mh.to_string().parse().unwrap();
        assert_eq!(parsed, mh);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        for code in [MultihashCode::Sha2_256, MultihashCode::Blake3, MultihashCode::Identity] {
            let mut hasher = MultihashHasher::new(code);
            hasher.update(b"hel");
            hasher.update(b"lo");
            assert_eq!(hasher.finalize(), Multihash::sum(code, b"hello"));
        }
    }

    #[test]
    fn test_read_bytes_truncated() {
        let mut bytes = Multihash::sum(MultihashCode::Sha2_256, b"x").to_bytes();
        bytes.truncate(20);
        assert!(Multihash::read_bytes(&bytes).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_trailing() {
        let mut bytes = Multihash::sum(MultihashCode::Blake3, b"x").to_bytes();
        bytes.push(0);
        assert!(Multihash::from_bytes(&bytes).is_err());
    }
}
