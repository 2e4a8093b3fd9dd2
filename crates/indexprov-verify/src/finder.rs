//! Batched lookups against an indexer.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::StatusCode;

use indexprov_core::{Multihash, ProviderId};

use crate::config::HttpFinderConfig;
use crate::error::{Result, VerifyError};
use crate::model::{FindRequest, FindResponse, MultihashResult, ProviderResult};

/// Looks up which providers an indexer holds for a batch of multihashes.
#[async_trait]
pub trait Finder: Send + Sync {
    async fn find_batch(&self, mhs: &[Multihash]) -> Result<FindResponse>;
}

/// Finder speaking the indexer's HTTP API.
pub struct HttpFinder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFinder {
    /// `addr` is either `host:port` or a URL with a scheme.
    pub fn new(addr: &str, config: &HttpFinderConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url(addr)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn base_url(addr: &str) -> Result<String> {
    let addr = addr.trim().trim_end_matches('/');
    if addr.is_empty() {
        return Err(VerifyError::Config("indexer address is empty".into()));
    }
    if addr.starts_with("http://") || addr.starts_with("https://") {
        Ok(addr.to_string())
    } else {
        Ok(format!("http://{}", addr))
    }
}

#[async_trait]
impl Finder for HttpFinder {
    async fn find_batch(&self, mhs: &[Multihash]) -> Result<FindResponse> {
        let url = format!("{}/multihash", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&FindRequest::new(mhs))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!(count = mhs.len(), "indexer has none of the batch");
                Ok(FindResponse::default())
            }
            status if status.is_success() => Ok(response.json().await?),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(VerifyError::Finder(format!(
                    "{} from {}: {}",
                    status,
                    url,
                    body.trim()
                )))
            }
        }
    }
}

/// In-memory finder for tests.
#[derive(Default)]
pub struct MemoryFinder {
    inner: RwLock<MemoryFinderInner>,
}

#[derive(Default)]
struct MemoryFinderInner {
    records: HashMap<Multihash, Vec<ProviderId>>,
    failure: Option<String>,
}

impl MemoryFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `mh` under `provider`.
    pub fn insert(&self, mh: Multihash, provider: impl Into<ProviderId>) {
        self.write().records.entry(mh).or_default().push(provider.into());
    }

    /// Know `mh` without any provider.
    pub fn insert_empty(&self, mh: Multihash) {
        self.write().records.entry(mh).or_default();
    }

    /// Make every lookup fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.write().failure = Some(message.into());
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryFinderInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Finder for MemoryFinder {
    async fn find_batch(&self, mhs: &[Multihash]) -> Result<FindResponse> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(message) = &inner.failure {
            return Err(VerifyError::Finder(message.clone()));
        }

        let multihash_results = mhs
            .iter()
            .filter_map(|mh| {
                inner.records.get(mh).map(|providers| MultihashResult {
                    multihash: mh.to_bytes(),
                    provider_results: providers
                        .iter()
                        .map(|p| ProviderResult::new(p.clone(), b"", b""))
                        .collect(),
                })
            })
            .collect();
        Ok(FindResponse { multihash_results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("localhost:3000").unwrap(), "http://localhost:3000");
        assert_eq!(base_url("https://idx.example/").unwrap(), "https://idx.example");
        assert!(base_url("  ").is_err());
    }
}
