//! JSON bodies of the indexer's batch lookup.
//!
//! Byte fields travel as standard base64 strings.

use serde::{Deserialize, Serialize};

use indexprov_core::{Multihash, ProviderId};

/// `POST /multihash` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    #[serde(rename = "Multihashes", with = "b64_list")]
    pub multihashes: Vec<Vec<u8>>,
}

impl FindRequest {
    pub fn new(mhs: &[Multihash]) -> Self {
        Self {
            multihashes: mhs.iter().map(Multihash::to_bytes).collect(),
        }
    }
}

/// Lookup response. An empty response means nothing is indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindResponse {
    #[serde(rename = "MultihashResults", default, deserialize_with = "null_as_empty")]
    pub multihash_results: Vec<MultihashResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultihashResult {
    #[serde(rename = "Multihash", with = "b64")]
    pub multihash: Vec<u8>,
    #[serde(rename = "ProviderResults", default, deserialize_with = "null_as_empty")]
    pub provider_results: Vec<ProviderResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    #[serde(rename = "ContextID", default, with = "b64")]
    pub context_id: Vec<u8>,
    #[serde(rename = "Metadata", default, with = "b64")]
    pub metadata: Vec<u8>,
    #[serde(rename = "Provider")]
    pub provider: AddrInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_empty")]
    pub addrs: Vec<String>,
}

impl ProviderResult {
    pub fn new(provider: impl Into<ProviderId>, context_id: &[u8], metadata: &[u8]) -> Self {
        Self {
            context_id: context_id.to_vec(),
            metadata: metadata.to_vec(),
            provider: AddrInfo {
                id: provider.into().to_string(),
                addrs: Vec::new(),
            },
        }
    }

    /// The provider identity, if it is a valid peer id of any key type.
    pub fn provider_id(&self) -> Option<ProviderId> {
        self.provider.id.parse().ok()
    }
}

impl MultihashResult {
    /// The decoded multihash, if well formed.
    pub fn decoded(&self) -> Option<Multihash> {
        Multihash::from_bytes(&self.multihash).ok()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

mod b64_list {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(list.len()))?;
        for bytes in list {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
