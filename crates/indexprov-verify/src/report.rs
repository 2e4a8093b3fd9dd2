//! The verification tally and its printed form.

use std::fmt;

/// Outcome of one verification run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyReport {
    /// Checked multihashes whose lookup failed.
    pub err: usize,
    /// Unknown to the indexer, or known with no provider.
    pub absent: usize,
    /// Indexed, but not under the expected provider.
    pub mismatch: usize,
    /// Indexed under the expected provider.
    pub present: usize,
    pub total: usize,
    pub sampling_prob: f64,
    pub rng_seed: i64,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.present == self.total
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Verification result:")?;
        writeln!(f, "  # failed to verify:                   {}", self.err)?;
        writeln!(f, "  # unindexed:                          {}", self.absent)?;
        writeln!(f, "  # indexed with another provider ID:   {}", self.mismatch)?;
        writeln!(f, "  # indexed with expected provider ID:  {}", self.present)?;
        writeln!(f, "--------------------------------------------")?;
        writeln!(f, "total Multihashes checked:              {}", self.total)?;
        writeln!(f)?;
        writeln!(f, "sampling probability:                   {:.2}", self.sampling_prob)?;
        writeln!(f, "RNG seed:                               {}", self.rng_seed)?;
        writeln!(f)?;
        if self.passed() {
            writeln!(f, "🎉 Passed verification check.")
        } else {
            writeln!(f, "❌ Failed verification check.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_report_text() {
        let report = VerifyReport {
            err: 0,
            absent: 0,
            mismatch: 0,
            present: 1049,
            total: 1049,
            sampling_prob: 1.0,
            rng_seed: 0,
        };
        let expected = "\n\
Verification result:\n\
\x20 # failed to verify:                   0\n\
\x20 # unindexed:                          0\n\
\x20 # indexed with another provider ID:   0\n\
\x20 # indexed with expected provider ID:  1049\n\
--------------------------------------------\n\
total Multihashes checked:              1049\n\
\n\
sampling probability:                   1.00\n\
RNG seed:                               0\n\
\n\
🎉 Passed verification check.\n";
        assert!(report.passed());
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_failed_report_banner() {
        let report = VerifyReport {
            err: 0,
            absent: 20,
            mismatch: 0,
            present: 0,
            total: 20,
            sampling_prob: 0.5,
            rng_seed: 42,
        };
        let text = report.to_string();
        assert!(!report.passed());
        assert!(text.contains("sampling probability:                   0.50\n"));
        assert!(text.contains("RNG seed:                               42\n"));
        assert!(text.ends_with("❌ Failed verification check.\n"));
    }

    #[test]
    fn test_empty_run_passes() {
        let report = VerifyReport {
            err: 0,
            absent: 0,
            mismatch: 0,
            present: 0,
            total: 0,
            sampling_prob: 0.1,
            rng_seed: 5,
        };
        assert!(report.passed());
    }
}
