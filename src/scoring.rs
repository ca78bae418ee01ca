//! Score Aggregation
//!
//! Combines executed check outcomes into one 0-100 score:
//!
//! ```text
//! score = floor(earned_weight * 100 / total_weight)   (total_weight > 0)
//! score = 0                                          (no checks executed)
//! ```
//!
//! Failed checks count toward `total_weight`, so a failing check lowers the
//! score instead of voiding the attestation.

use crate::attestation::CheckOutcome;

/// Upper bound of an aggregate score.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreAggregator;

impl ScoreAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `(passed, weight)` pairs.
    pub fn aggregate(&self, results: &[(bool, u32)]) -> u8 {
        let (earned, total) = results
            .iter()
            .fold((0u64, 0u64), |(earned, total), &(passed, weight)| {
                let weight = u64::from(weight);
                (if passed { earned + weight } else { earned }, total + weight)
            });

        if total == 0 {
            return 0;
        }

        // earned <= total, so the quotient is at most 100
        (earned * u64::from(MAX_SCORE) / total) as u8
    }

    pub fn aggregate_outcomes(&self, outcomes: &[CheckOutcome]) -> u8 {
        let pairs: Vec<(bool, u32)> = outcomes.iter().map(|o| (o.passed, o.weight)).collect();
        self.aggregate(&pairs)
    }
}
