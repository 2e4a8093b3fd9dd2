//! `provider verify-ingest` -- Check that an indexer holds a provider's multihashes.

use std::path::PathBuf;

use clap::Args;

use indexprov_core::ProviderId;
use indexprov_verify::{
    verify_ingest, HttpFinder, HttpFinderConfig, MultihashSource, VerifyConfig,
};

pub const LONG_ABOUT: &str = "\
Verifies whether the multihashes of a CAR file or CAR index are ingested by an indexer node under
the expected provider peer ID.

Sources (exactly one):
  --from-car        any CAR version; a multihash-sorted index is generated when none is embedded
  --from-car-index  an index file in multihash-sorted format

By default every multihash is checked. --sampling-prob picks each one independently with the given
probability; --rng-seed makes that selection repeatable.

Verification passes when every checked multihash is indexed with the expected provider ID.";

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Path to the CAR file from which to extract the multihashes to verify
    #[arg(long = "from-car", visible_alias = "fc")]
    pub from_car: Option<PathBuf>,
    /// Path to the CAR index file from which to extract the multihashes to verify
    #[arg(long = "from-car-index", visible_alias = "fci")]
    pub from_car_index: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyIngestArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// The host:port of the indexer node to verify ingestion against
    #[arg(long = "to", short = 'i')]
    pub to: String,
    /// The peer ID of the provider the multihashes should be associated with
    #[arg(long = "provider-id", visible_alias = "pid")]
    pub provider_id: ProviderId,
    /// Probability of selecting each multihash, larger than 0.0 and at most 1.0
    #[arg(long = "sampling-prob", visible_alias = "sp", default_value_t = 1.0, value_parser = parse_prob)]
    pub sampling_prob: f64,
    /// Seed for the sampling RNG; ignored when the sampling probability is 1.0
    #[arg(long = "rng-seed", visible_alias = "rs", allow_negative_numbers = true)]
    pub rng_seed: Option<i64>,
}

fn parse_prob(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if p > 0.0 && p <= 1.0 {
        Ok(p)
    } else {
        Err("sampling probability must be larger than 0.0 and smaller or equal to 1.0".into())
    }
}

impl VerifyIngestArgs {
    pub fn to_config(&self) -> anyhow::Result<VerifyConfig> {
        let source = match (&self.source.from_car, &self.source.from_car_index) {
            (Some(car), None) => MultihashSource::Car(car.clone()),
            (None, Some(index)) => MultihashSource::CarIndex(index.clone()),
            _ => anyhow::bail!("exactly one multihash source must be specified"),
        };
        Ok(VerifyConfig {
            source,
            indexer: self.to.clone(),
            provider_id: self.provider_id.clone(),
            sampling_prob: self.sampling_prob,
            rng_seed: self.rng_seed,
        })
    }
}

/// Run the verification and print the report. Returns whether it passed.
pub async fn run(args: VerifyIngestArgs) -> anyhow::Result<bool> {
    let config = args.to_config()?;
    config.validate()?;
    let finder = HttpFinder::new(&config.indexer, &HttpFinderConfig::default())?;

    let report = verify_ingest(&config, &finder).await?;
    print!("{}", report);
    Ok(report.passed())
}
