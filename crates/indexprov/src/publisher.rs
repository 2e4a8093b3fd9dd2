//! Publication sinks for advertisements.
//!
//! A publisher stores the canonical bytes of each advertisement and the
//! current chain head. [`Publisher::publish`] must write both or neither.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use indexprov_core::{Cid, Link};
use indexprov_store::{Batch, Datastore};

use crate::error::{EngineError, Result};

/// Key of the persisted chain head.
pub const HEAD_KEY: &str = "/sync/head";

/// Namespace of stored advertisements.
pub const AD_KEY_PREFIX: &str = "/ad/";

/// Where published advertisements go.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The persisted chain head, if any.
    async fn head(&self) -> Result<Option<Link>>;

    /// Store `canonical` under `link` and make `link` the head.
    async fn publish(&self, link: &Link, canonical: Bytes) -> Result<()>;

    /// Canonical bytes of a published advertisement.
    async fn get(&self, link: &Link) -> Result<Option<Bytes>>;

    /// Release resources. Default: no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory publisher.
///
/// All data is lost when the publisher is dropped.
pub struct MemoryPublisher {
    inner: RwLock<MemoryPublisherInner>,
}

#[derive(Default)]
struct MemoryPublisherInner {
    ads: HashMap<Link, Bytes>,
    order: Vec<Link>,
    head: Option<Link>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryPublisherInner::default()),
        }
    }

    /// Links in the order they were published.
    pub fn published(&self) -> Vec<Link> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn head(&self) -> Result<Option<Link>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .head
            .clone())
    }

    async fn publish(&self, link: &Link, canonical: Bytes) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.ads.insert(link.clone(), canonical);
        inner.order.push(link.clone());
        inner.head = Some(link.clone());
        Ok(())
    }

    async fn get(&self, link: &Link) -> Result<Option<Bytes>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ads
            .get(link)
            .cloned())
    }
}

/// Publisher backed by a [`Datastore`].
///
/// Advertisements live under `/ad/<link>` and the head under `/sync/head`;
/// both are written in one batch.
pub struct DatastorePublisher<D> {
    ds: D,
}

impl<D: Datastore> DatastorePublisher<D> {
    pub fn new(ds: D) -> Self {
        Self { ds }
    }

    pub fn datastore(&self) -> &D {
        &self.ds
    }
}

fn ad_key(link: &Link) -> String {
    format!("{}{}", AD_KEY_PREFIX, link)
}

#[async_trait]
impl<D: Datastore> Publisher for DatastorePublisher<D> {
    async fn head(&self) -> Result<Option<Link>> {
        match self.ds.get(HEAD_KEY).await? {
            Some(bytes) => Ok(Some(Cid::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn publish(&self, link: &Link, canonical: Bytes) -> Result<()> {
        let batch = Batch::new()
            .put(ad_key(link), canonical)
            .put(HEAD_KEY, link.to_bytes());
        self.ds.batch(batch).await?;
        Ok(())
    }

    async fn get(&self, link: &Link) -> Result<Option<Bytes>> {
        Ok(self.ds.get(&ad_key(link)).await?)
    }

    async fn close(&self) -> Result<()> {
        self.ds.close().await.map_err(EngineError::from)
    }
}
