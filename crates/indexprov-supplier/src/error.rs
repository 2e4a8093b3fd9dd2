//! Error types for content suppliers.

use thiserror::Error;

use indexprov_core::CoreError;
use indexprov_store::StoreError;

/// Errors raised while reading CAR files and indexes.
#[derive(Debug, Error)]
pub enum CarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid CAR header: {0}")]
    InvalidHeader(String),

    #[error("unsupported CAR version: {0}")]
    UnsupportedVersion(u64),

    #[error("invalid CAR section: {0}")]
    InvalidSection(String),

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("index codec {0:#x} is not multihash-sorted")]
    UnsupportedIndex(u64),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors returned by [`crate::CarSupplier`] and the entry stream.
#[derive(Debug, Error)]
pub enum SupplierError {
    /// No registration record for the given id or path.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Car(#[from] CarError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The supplier (or its datastore) was closed.
    #[error("supplier is closed")]
    Closed,

    /// A blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl From<StoreError> for SupplierError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => SupplierError::NotFound(key),
            StoreError::Closed => SupplierError::Closed,
            other => SupplierError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for SupplierError {
    fn from(e: tokio::task::JoinError) -> Self {
        SupplierError::Join(e.to_string())
    }
}

impl SupplierError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SupplierError::NotFound(_))
    }
}

/// Result type for supplier operations.
pub type Result<T> = std::result::Result<T, SupplierError>;
