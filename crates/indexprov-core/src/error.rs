//! Error types for indexprov core.

use thiserror::Error;

/// Core errors raised by encoding, decoding and key handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    #[error("invalid multiaddr: {0}")]
    InvalidMultiaddr(String),

    #[error("invalid cid: {0}")]
    InvalidCid(String),

    #[error("malformed advertisement: {0}")]
    MalformedAdvertisement(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Errors returned while building and signing an advertisement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("context id must be set when override is enabled")]
    OverrideWithoutContext,

    #[error("addresses must not be empty")]
    EmptyAddresses,

    #[error("invalid provider identity {id:?}: {reason}")]
    InvalidIdentity { id: String, reason: String },

    #[error("provider identity {id} does not match its signing key")]
    IdentityKeyMismatch { id: String },

    #[error("context id exceeds {max} bytes (got {got})")]
    ContextIdTooLong { max: usize, got: usize },

    #[error("metadata exceeds {max} bytes (got {got})")]
    MetadataTooLong { max: usize, got: usize },
}

/// Validation errors for advertisement structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("extended provider {0} has an invalid signature")]
    ExtendedSignatureFailed(String),

    #[error("non-removal advertisement has no addresses")]
    MissingAddresses,

    #[error("extended provider {0} has no addresses")]
    ExtendedProviderMissingAddresses(String),

    #[error("override requires a context id")]
    OverrideWithoutContext,

    #[error("removal advertisement must not carry entries")]
    RemovalWithEntries,

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::InvalidPeerId(msg)
            | CoreError::InvalidMultiaddr(msg)
            | CoreError::InvalidCid(msg)
            | CoreError::MalformedAdvertisement(msg)
            | CoreError::EncodingError(msg)
            | CoreError::DecodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}
