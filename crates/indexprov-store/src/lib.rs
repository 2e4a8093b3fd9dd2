//! # indexprov store
//!
//! Key-value storage for the index provider: advertisement bytes, the chain
//! head and content registration records all live behind the [`Datastore`]
//! trait.
//!
//! ## Key Types
//!
//! - [`Datastore`] - The async trait for all storage operations
//! - [`SqliteDatastore`] - SQLite-based persistent storage
//! - [`MemoryDatastore`] - In-memory storage for tests
//! - [`Batch`] - A group of writes applied atomically
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use indexprov_store::{Batch, Datastore, SqliteDatastore};
//!
//! async fn example() -> indexprov_store::Result<()> {
//!     let store = SqliteDatastore::open("provider.db")?;
//!     store
//!         .batch(Batch::new().put("/a", Bytes::from_static(b"1")).delete("/b"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryDatastore;
pub use sqlite::SqliteDatastore;
pub use traits::{Batch, BatchOp, Datastore, DatastoreExt};
