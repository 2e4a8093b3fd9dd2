//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! The advertisement link is the hash of these bytes, so the same advertisement
//! must encode identically everywhere.

use bytes::Bytes;
use ciborium::value::{Integer, Value};

use crate::advertisement::{Advertisement, Entries, ExtendedProvider, ExtendedProviderInfo};
use crate::cid::Cid;
use crate::crypto::Ed25519Signature;
use crate::error::CoreError;
use crate::peer::{Multiaddr, PeerId};

/// Advertisement field keys.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const PREVIOUS_ID: u64 = 0;
    pub const PROVIDER: u64 = 1;
    pub const ADDRESSES: u64 = 2;
    pub const ENTRIES: u64 = 3;
    pub const CONTEXT_ID: u64 = 4;
    pub const METADATA: u64 = 5;
    pub const IS_RM: u64 = 6;
    pub const EXTENDED_PROVIDER: u64 = 7;
    pub const SIGNATURE: u64 = 8;
}

/// Extended provider section keys.
mod xp_keys {
    pub const OVERRIDE: u64 = 0;
    pub const PROVIDERS: u64 = 1;

    pub const ID: u64 = 0;
    pub const ADDRESSES: u64 = 1;
    pub const METADATA: u64 = 2;
    pub const SIGNATURE: u64 = 3;

    pub const CONTEXT_ID: u64 = 1;
}

/// Encode a full advertisement, signature included.
pub fn canonical_bytes(ad: &Advertisement) -> Vec<u8> {
    encode_cbor_value_canonical(&advertisement_to_cbor_value(ad, true))
}

/// Encode the fields covered by the advertisement signature (everything but key 8).
pub fn canonical_signing_bytes(ad: &Advertisement) -> Vec<u8> {
    encode_cbor_value_canonical(&advertisement_to_cbor_value(ad, false))
}

/// Encode the tuple an extended provider entry signs.
pub fn xp_signing_bytes(id: &PeerId, context_id: &[u8], metadata: &[u8]) -> Vec<u8> {
    let value = Value::Map(vec![
        (int(xp_keys::ID), Value::Bytes(id.to_bytes())),
        (int(xp_keys::CONTEXT_ID), Value::Bytes(context_id.to_vec())),
        (int(xp_keys::METADATA), Value::Bytes(metadata.to_vec())),
    ]);
    encode_cbor_value_canonical(&value)
}

fn int(key: u64) -> Value {
    Value::Integer(key.into())
}

fn addresses_value(addresses: &[Multiaddr]) -> Value {
    Value::Array(
        addresses
            .iter()
            .map(|a| Value::Text(a.as_str().to_string()))
            .collect(),
    )
}

fn advertisement_to_cbor_value(ad: &Advertisement, with_signature: bool) -> Value {
    let mut entries = Vec::with_capacity(9);

    let previous = match &ad.previous_id {
        Some(link) => Value::Bytes(link.to_bytes()),
        None => Value::Null,
    };
    entries.push((int(keys::PREVIOUS_ID), previous));
    entries.push((int(keys::PROVIDER), Value::Bytes(ad.provider.to_bytes())));
    entries.push((int(keys::ADDRESSES), addresses_value(&ad.addresses)));

    let link = match &ad.entries {
        Entries::Link(link) => Value::Bytes(link.to_bytes()),
        Entries::NoEntries => Value::Null,
    };
    entries.push((int(keys::ENTRIES), link));
    entries.push((int(keys::CONTEXT_ID), Value::Bytes(ad.context_id.to_vec())));
    entries.push((int(keys::METADATA), Value::Bytes(ad.metadata.to_vec())));
    entries.push((int(keys::IS_RM), Value::Bool(ad.is_rm)));

    let xp = match &ad.extended_provider {
        Some(xp) => extended_provider_to_cbor_value(xp),
        None => Value::Null,
    };
    entries.push((int(keys::EXTENDED_PROVIDER), xp));

    if with_signature {
        entries.push((int(keys::SIGNATURE), Value::Bytes(ad.signature.0.to_vec())));
    }

    Value::Map(entries)
}

fn extended_provider_to_cbor_value(xp: &ExtendedProvider) -> Value {
    let providers = xp
        .providers
        .iter()
        .map(|p| {
            Value::Map(vec![
                (int(xp_keys::ID), Value::Bytes(p.id.to_bytes())),
                (int(xp_keys::ADDRESSES), addresses_value(&p.addresses)),
                (int(xp_keys::METADATA), Value::Bytes(p.metadata.to_vec())),
                (int(xp_keys::SIGNATURE), Value::Bytes(p.signature.0.to_vec())),
            ])
        })
        .collect();

    Value::Map(vec![
        (int(xp_keys::OVERRIDE), Value::Bool(xp.override_providers)),
        (int(xp_keys::PROVIDERS), Value::Array(providers)),
    ])
}

/// Encode a CBOR Value to canonical bytes.
pub(crate) fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => panic!("floats not supported in canonical encoding"),
        _ => panic!("unsupported CBOR value type"),
    }
}

fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
pub(crate) fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Keys are sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode an advertisement from its canonical bytes.
///
/// Input that decodes but does not re-encode to the same bytes is rejected,
/// so a decoded advertisement always has the link of its input.
pub fn decode_advertisement(bytes: &[u8]) -> Result<Advertisement, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let ad = cbor_value_to_advertisement(&value)?;
    if canonical_bytes(&ad) != bytes {
        return Err(CoreError::MalformedAdvertisement("non-canonical encoding".into()));
    }
    Ok(ad)
}

fn malformed(msg: &str) -> CoreError {
    CoreError::MalformedAdvertisement(msg.to_string())
}

fn as_map(value: &Value) -> Result<&[(Value, Value)], CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(malformed("expected map")),
    }
}

fn get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
        .map(|(_, v)| v)
}

fn get_bytes<'a>(map: &'a [(Value, Value)], key: u64, field: &str) -> Result<&'a [u8], CoreError> {
    match get(map, key) {
        Some(Value::Bytes(b)) => Ok(b),
        _ => Err(CoreError::MalformedAdvertisement(format!("invalid {}", field))),
    }
}

fn get_addresses(map: &[(Value, Value)], key: u64) -> Result<Vec<Multiaddr>, CoreError> {
    match get(map, key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Text(s) => s.parse(),
                _ => Err(malformed("address must be text")),
            })
            .collect(),
        _ => Err(malformed("invalid addresses")),
    }
}

fn optional_cid(map: &[(Value, Value)], key: u64, field: &str) -> Result<Option<Cid>, CoreError> {
    match get(map, key) {
        Some(Value::Bytes(b)) => Ok(Some(Cid::from_bytes(b)?)),
        Some(Value::Null) => Ok(None),
        _ => Err(CoreError::MalformedAdvertisement(format!("invalid {}", field))),
    }
}

fn cbor_value_to_advertisement(value: &Value) -> Result<Advertisement, CoreError> {
    let map = as_map(value)?;

    let previous_id = optional_cid(map, keys::PREVIOUS_ID, "previous_id")?;
    let provider = PeerId::from_bytes(get_bytes(map, keys::PROVIDER, "provider")?)?;
    let addresses = get_addresses(map, keys::ADDRESSES)?;
    let entries = match optional_cid(map, keys::ENTRIES, "entries")? {
        Some(link) => Entries::Link(link),
        None => Entries::NoEntries,
    };
    let context_id = Bytes::copy_from_slice(get_bytes(map, keys::CONTEXT_ID, "context_id")?);
    let metadata = Bytes::copy_from_slice(get_bytes(map, keys::METADATA, "metadata")?);
    let is_rm = match get(map, keys::IS_RM) {
        Some(Value::Bool(b)) => *b,
        _ => return Err(malformed("invalid is_rm")),
    };
    let extended_provider = match get(map, keys::EXTENDED_PROVIDER) {
        Some(Value::Null) => None,
        Some(xp) => Some(cbor_value_to_extended_provider(xp)?),
        None => return Err(malformed("missing extended_provider")),
    };
    let signature = Ed25519Signature::from_slice(get_bytes(map, keys::SIGNATURE, "signature")?)?;

    Ok(Advertisement {
        previous_id,
        provider,
        addresses,
        entries,
        context_id,
        metadata,
        is_rm,
        extended_provider,
        signature,
    })
}

fn cbor_value_to_extended_provider(value: &Value) -> Result<ExtendedProvider, CoreError> {
    let map = as_map(value)?;

    let override_providers = match get(map, xp_keys::OVERRIDE) {
        Some(Value::Bool(b)) => *b,
        _ => return Err(malformed("invalid override")),
    };
    let items = match get(map, xp_keys::PROVIDERS) {
        Some(Value::Array(items)) => items,
        _ => return Err(malformed("invalid providers")),
    };

    let mut providers = Vec::with_capacity(items.len());
    for item in items {
        let entry = as_map(item)?;
        providers.push(ExtendedProviderInfo {
            id: PeerId::from_bytes(get_bytes(entry, xp_keys::ID, "extended provider id")?)?,
            addresses: get_addresses(entry, xp_keys::ADDRESSES)?,
            metadata: Bytes::copy_from_slice(get_bytes(
                entry,
                xp_keys::METADATA,
                "extended provider metadata",
            )?),
            signature: Ed25519Signature::from_slice(get_bytes(
                entry,
                xp_keys::SIGNATURE,
                "extended provider signature",
            )?)?,
        });
    }

    Ok(ExtendedProvider {
        override_providers,
        providers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::Link;
    use crate::crypto::Keypair;

    fn sample_ad() -> Advertisement {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let xp_key = Keypair::from_seed(&[0x43; 32]);
        let addresses: Vec<Multiaddr> = vec!["/ip4/127.0.0.1/tcp/3104".parse().unwrap()];
        let xp = ExtendedProviderInfo::sign(
            &xp_key,
            xp_key.peer_id(),
            vec!["/dns4/example.com/tcp/443/https".parse().unwrap()],
            Bytes::from_static(b"xp-meta"),
            b"ctx",
        );
        let mut ad = Advertisement {
            previous_id: Some(Link::dag_cbor_of(b"prev")),
            provider: keypair.peer_id(),
            addresses,
            entries: Entries::Link(Link::dag_cbor_of(b"entries")),
            context_id: Bytes::from_static(b"ctx"),
            metadata: Bytes::from_static(b"meta"),
            is_rm: false,
            extended_provider: Some(ExtendedProvider {
                override_providers: true,
                providers: vec![xp],
            }),
            signature: Ed25519Signature::ZERO,
        };
        ad.sign(&keypair);
        ad
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let ad = sample_ad();
        assert_eq!(canonical_bytes(&ad), canonical_bytes(&ad.clone()));
    }

    #[test]
    fn test_signing_bytes_exclude_signature() {
        let ad = sample_ad();
        let mut unsigned = ad.clone();
        unsigned.signature = Ed25519Signature::ZERO;
        assert_eq!(canonical_signing_bytes(&ad), canonical_signing_bytes(&unsigned));
        assert_ne!(canonical_bytes(&ad), canonical_bytes(&unsigned));
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 2, 1024);
        assert_eq!(buf, vec![0x59, 0x04, 0x00]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (int(8), Value::Integer(80.into())),
            (int(0), Value::Integer(0.into())),
            (int(5), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);
        assert_eq!(buf, vec![0xa3, 0x00, 0x00, 0x05, 0x18, 50, 0x08, 0x18, 80]);
    }

    #[test]
    fn test_decode_restores_advertisement() {
        let ad = sample_ad();
        let decoded = decode_advertisement(&canonical_bytes(&ad)).unwrap();
        assert_eq!(decoded, ad);
        assert_eq!(decoded.link(), ad.link());
        assert!(decoded.verify_signature().is_ok());
    }

    #[test]
    fn test_decode_first_ad_without_extended_provider() {
        let mut ad = sample_ad();
        ad.previous_id = None;
        ad.extended_provider = None;
        ad.entries = Entries::NoEntries;
        let decoded = decode_advertisement(&canonical_bytes(&ad)).unwrap();
        assert_eq!(decoded.previous_id, None);
        assert_eq!(decoded.entries, Entries::NoEntries);
        assert!(decoded.extended_provider.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_advertisement(&[]).is_err());
        assert!(decode_advertisement(&[0xa0]).is_err());
        let mut bytes = canonical_bytes(&sample_ad());
        bytes.truncate(bytes.len() - 3);
        assert!(decode_advertisement(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = canonical_bytes(&sample_ad());
        bytes.push(0x00);
        assert!(decode_advertisement(&bytes).is_err());
    }
}
