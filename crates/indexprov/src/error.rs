//! Error types for the engine.

use indexprov_core::{BuildError, CoreError, PeerId, ValidationError};
use indexprov_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The advertisement is structurally invalid.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The advertisement is unsigned or its signature does not verify.
    #[error("signature error: {0}")]
    Signature(#[source] CoreError),

    /// The advertisement names a provider other than the engine's identity.
    #[error("advertisement provider {0} is not this engine's identity")]
    ForeignProvider(PeerId),

    /// Building an advertisement failed.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Stored advertisement bytes failed to decode.
    #[error("corrupt advertisement: {0}")]
    Decode(#[from] CoreError),

    /// Advertisement not found.
    #[error("advertisement not found: {0}")]
    NotFound(String),

    /// The publishing task panicked or was aborted.
    #[error("publish task failed: {0}")]
    Task(String),

    /// The engine has been shut down.
    #[error("engine is shut down")]
    Closed,
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
