//! Verification configuration.

use std::path::PathBuf;
use std::time::Duration;

use indexprov_core::ProviderId;

use crate::error::{Result, VerifyError};

/// Where the multihashes to verify come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultihashSource {
    /// A CARv1 or CARv2 file.
    Car(PathBuf),
    /// A standalone multihash-sorted index file.
    CarIndex(PathBuf),
}

/// Configuration for one verification run.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub source: MultihashSource,
    /// Indexer address, `host:port` or a full URL.
    pub indexer: String,
    /// The provider every multihash should be indexed under.
    pub provider_id: ProviderId,
    /// Chance of each multihash being checked, in `(0, 1]`.
    pub sampling_prob: f64,
    /// Sampler seed. `None` or zero picks a time-derived seed.
    pub rng_seed: Option<i64>,
}

impl VerifyConfig {
    pub fn new(
        source: MultihashSource,
        indexer: impl Into<String>,
        provider_id: impl Into<ProviderId>,
    ) -> Self {
        Self {
            source,
            indexer: indexer.into(),
            provider_id: provider_id.into(),
            sampling_prob: 1.0,
            rng_seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_prob > 0.0 && self.sampling_prob <= 1.0) {
            return Err(VerifyError::Config(
                "sampling probability must be larger than 0.0 and smaller or equal to 1.0".into(),
            ));
        }
        if self.indexer.trim().is_empty() {
            return Err(VerifyError::Config("indexer address is empty".into()));
        }
        Ok(())
    }
}

/// Configuration for [`crate::HttpFinder`].
#[derive(Debug, Clone)]
pub struct HttpFinderConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for HttpFinderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}
