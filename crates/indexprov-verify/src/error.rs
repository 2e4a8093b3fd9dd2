//! Error types for ingest verification.

use indexprov_supplier::CarError;
use thiserror::Error;

/// Errors that stop a verification before a report exists.
///
/// Lookup failures are not among them: they are counted in the report.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The multihash source could not be read.
    #[error("multihash source: {0}")]
    Source(#[from] CarError),

    /// The indexer client could not be built or the lookup failed.
    #[error("finder: {0}")]
    Finder(String),
}

impl From<reqwest::Error> for VerifyError {
    fn from(e: reqwest::Error) -> Self {
        VerifyError::Finder(e.to_string())
    }
}

/// Result type for verification.
pub type Result<T> = std::result::Result<T, VerifyError>;
