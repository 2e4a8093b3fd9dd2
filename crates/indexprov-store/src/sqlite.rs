//! SQLite implementation of the Datastore trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Batch, BatchOp, Datastore};

/// SQLite-based datastore.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. `close` drops the connection.
#[derive(Clone)]
pub struct SqliteDatastore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteDatastore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Run `f` on the connection inside the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value.as_ref()],
            )?;
            Ok(())
        })
        .await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn batch(&self, batch: Batch) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for op in batch.ops() {
                match op {
                    BatchOp::Put { key, value } => {
                        tx.execute(
                            "INSERT INTO kv (key, value) VALUES (?1, ?2)
                             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                            params![key, value.as_ref()],
                        )?;
                    }
                    BatchOp::Delete { key } => {
                        tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Bytes)>> {
        let prefix = prefix.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM kv
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix], |row| {
                let key: String = row.get(0)?;
                let value: Vec<u8> = row.get(1)?;
                Ok((key, Bytes::from(value)))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StoreError::Database(e))?;
                tracing::debug!("sqlite datastore closed");
            }
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteDatastore::open_memory().unwrap();
        store.put("/a", Bytes::from_static(b"one")).await.unwrap();
        assert_eq!(store.get("/a").await.unwrap(), Some(Bytes::from_static(b"one")));

        store.put("/a", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("/a").await.unwrap(), Some(Bytes::from_static(b"two")));
        assert_eq!(store.get("/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let store = SqliteDatastore::open_memory().unwrap();
        store.put("/keep", Bytes::from_static(b"k")).await.unwrap();

        let batch = Batch::new()
            .put("/x", Bytes::from_static(b"x"))
            .delete("/keep");
        store.batch(batch).await.unwrap();
        assert!(store.has("/x").await.unwrap());
        assert!(!store.has("/keep").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_prefix() {
        let store = SqliteDatastore::open_memory().unwrap();
        store.put("/car://aaa", Bytes::from_static(b"1")).await.unwrap();
        store.put("/car://bbb", Bytes::from_static(b"2")).await.unwrap();
        store.put("/bafy", Bytes::from_static(b"3")).await.unwrap();

        let rows = store.query_prefix("/car://").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "/car://aaa");

        let all = store.query_prefix("/").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqliteDatastore::open(&path).unwrap();
            store.put("/sync/head", Bytes::from_static(b"h")).await.unwrap();
            store.close().await.unwrap();
        }
        let store = SqliteDatastore::open(&path).unwrap();
        assert_eq!(
            store.get("/sync/head").await.unwrap(),
            Some(Bytes::from_static(b"h"))
        );
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = SqliteDatastore::open_memory().unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.get("/a").await, Err(StoreError::Closed)));
        // Closing again is a no-op.
        store.close().await.unwrap();
    }
}
