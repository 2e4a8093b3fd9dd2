//! # indexprov verify
//!
//! Checks that an indexer has ingested a provider's content: reads the
//! multihashes of a CAR (or a CAR index), samples them, looks them up in one
//! batch and tallies the result.
//!
//! All settings arrive in a [`VerifyConfig`]; there is no process-wide state.

pub mod config;
pub mod error;
pub mod finder;
pub mod model;
pub mod report;
pub mod sampler;
pub mod source;
pub mod verify;

pub use config::{HttpFinderConfig, MultihashSource, VerifyConfig};
pub use error::{Result, VerifyError};
pub use finder::{Finder, HttpFinder, MemoryFinder};
pub use report::VerifyReport;
pub use sampler::Sampler;
pub use verify::{verify_ingest, verify_multihashes};
