//! Per-multihash inclusion decisions.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Decides, one candidate at a time, whether to check a multihash.
///
/// With probability 1 every candidate is included and no generator is used.
/// Otherwise each call draws one uniform `f64` and includes the candidate
/// when it is `<= prob`, so a fixed seed and input order repeat exactly.
#[derive(Debug, Clone)]
pub struct Sampler {
    prob: f64,
    seed: i64,
    rng: Option<ChaCha8Rng>,
}

impl Sampler {
    pub fn new(prob: f64, seed: Option<i64>) -> Self {
        let given = seed.unwrap_or(0);
        if prob >= 1.0 {
            return Self {
                prob,
                seed: given,
                rng: None,
            };
        }

        let seed = if given == 0 { time_seed() } else { given };
        Self {
            prob,
            seed,
            rng: Some(ChaCha8Rng::seed_from_u64(seed as u64)),
        }
    }

    /// The seed in effect, as reported.
    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn prob(&self) -> f64 {
        self.prob
    }

    pub fn include(&mut self) -> bool {
        match &mut self.rng {
            None => true,
            Some(rng) => rng.gen::<f64>() <= self.prob,
        }
    }
}

fn time_seed() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    match nanos as i64 {
        0 => 1,
        n => n,
    }
}
