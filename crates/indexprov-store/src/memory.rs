//! In-memory implementation of the Datastore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{Batch, BatchOp, Datastore};

/// In-memory datastore.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; a batch
/// is applied under a single write lock.
#[derive(Default)]
pub struct MemoryDatastore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: BTreeMap<String, Bytes>,
    closed: bool,
}

impl MemoryDatastore {
    /// Create a new empty in-memory datastore.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryInner>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryInner>> {
        let inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.write()?.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read()?.entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.write()?.entries.remove(key);
        Ok(())
    }

    async fn batch(&self, batch: Batch) -> Result<()> {
        let mut inner = self.write()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    inner.entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    inner.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.closed = true;
        inner.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryDatastore::new();
        store.put("/a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(store.get("/a").await.unwrap(), Some(Bytes::from_static(b"1")));
        assert!(store.has("/a").await.unwrap());

        store.delete("/a").await.unwrap();
        assert_eq!(store.get("/a").await.unwrap(), None);
        // Deleting twice is fine.
        store.delete("/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_prefix_ordered() {
        let store = MemoryDatastore::new();
        for key in ["/b/2", "/a/1", "/b/1", "/c"] {
            store.put(key, Bytes::from(key.to_string())).await.unwrap();
        }
        let keys: Vec<String> = store
            .query_prefix("/b/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["/b/1".to_string(), "/b/2".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_applies_in_order() {
        let store = MemoryDatastore::new();
        store.put("/old", Bytes::from_static(b"x")).await.unwrap();
        let batch = Batch::new()
            .put("/new", Bytes::from_static(b"y"))
            .delete("/old")
            .put("/new", Bytes::from_static(b"z"));
        store.batch(batch).await.unwrap();

        assert!(!store.has("/old").await.unwrap());
        assert_eq!(store.get("/new").await.unwrap(), Some(Bytes::from_static(b"z")));
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemoryDatastore::new();
        store.close().await.unwrap();
        assert!(matches!(store.get("/a").await, Err(StoreError::Closed)));
        assert!(matches!(
            store.put("/a", Bytes::new()).await,
            Err(StoreError::Closed)
        ));
    }
}
