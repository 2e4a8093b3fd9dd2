//! The verification run.

use std::collections::HashMap;

use indexprov_core::{Multihash, ProviderId};

use crate::config::VerifyConfig;
use crate::error::{Result, VerifyError};
use crate::finder::Finder;
use crate::report::VerifyReport;
use crate::sampler::Sampler;

/// Verify that the indexer holds the configured source under the expected
/// provider.
///
/// Reading the source runs on the blocking pool. Lookup failures are counted
/// in the report rather than returned.
pub async fn verify_ingest<F: Finder + ?Sized>(
    config: &VerifyConfig,
    finder: &F,
) -> Result<VerifyReport> {
    config.validate()?;
    let source = config.source.clone();
    let mhs = tokio::task::spawn_blocking(move || source.multihashes())
        .await
        .map_err(|e| VerifyError::Config(format!("source reader panicked: {}", e)))??;
    tracing::debug!(count = mhs.len(), source = %config.source.path().display(), "loaded multihashes");

    let mut sampler = Sampler::new(config.sampling_prob, config.rng_seed);
    Ok(verify_multihashes(mhs, finder, &config.provider_id, &mut sampler).await)
}

/// Sample `candidates` in order, look the kept ones up in one batch, and
/// classify each.
pub async fn verify_multihashes<F: Finder + ?Sized>(
    candidates: impl IntoIterator<Item = Multihash>,
    finder: &F,
    provider: &ProviderId,
    sampler: &mut Sampler,
) -> VerifyReport {
    let mhs: Vec<Multihash> = candidates.into_iter().filter(|_| sampler.include()).collect();
    let mut report = VerifyReport {
        err: 0,
        absent: 0,
        mismatch: 0,
        present: 0,
        total: mhs.len(),
        sampling_prob: sampler.prob(),
        rng_seed: sampler.seed(),
    };

    let response = match finder.find_batch(&mhs).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, count = mhs.len(), "batch lookup failed");
            report.err = mhs.len();
            return report;
        }
    };

    let mut lookup = HashMap::new();
    for result in response.multihash_results {
        if let Some(mh) = result.decoded() {
            lookup.entry(mh).or_insert(result.provider_results);
        }
    }

    for mh in &mhs {
        match lookup.get(mh) {
            None => report.absent += 1,
            Some(providers) if providers.is_empty() => report.absent += 1,
            Some(providers) => {
                if providers.iter().any(|p| p.provider_id().as_ref() == Some(provider)) {
                    report.present += 1;
                } else {
                    report.mismatch += 1;
                }
            }
        }
    }
    report
}
