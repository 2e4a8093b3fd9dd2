//! Datastore trait: the abstract interface for key-value persistence.
//!
//! Keys are `/`-separated paths such as `/sync/head`. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};

/// A single write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: Bytes },
    Delete { key: String },
}

/// A group of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The Datastore trait: async interface for key-value persistence.
///
/// Every method is individually atomic. Multi-key writes that must land
/// together go through [`Datastore::batch`].
///
/// After [`Datastore::close`] every call fails with [`StoreError::Closed`].
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Check whether `key` is present.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Apply every operation in `batch`, or none of them.
    async fn batch(&self, batch: Batch) -> Result<()>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>>;

    /// Release resources.
    async fn close(&self) -> Result<()>;
}

/// Extension helpers for [`Datastore`].
#[async_trait]
pub trait DatastoreExt: Datastore {
    /// Get a value, mapping absence to [`StoreError::NotFound`].
    async fn get_required(&self, key: &str) -> Result<Bytes> {
        self.get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

impl<T: Datastore + ?Sized> DatastoreExt for T {}

#[async_trait]
impl<T: Datastore + ?Sized> Datastore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        (**self).has(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn batch(&self, batch: Batch) -> Result<()> {
        (**self).batch(batch).await
    }

    async fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        (**self).query_prefix(prefix).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
