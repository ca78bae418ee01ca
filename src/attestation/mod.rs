//! Attestation Models
//!
//! An attestation is an externally produced, already proof-carrying claim
//! that a resource returned specific content at a specific time. The engine
//! never mutates one; it only checks it against a rule and scores it.

pub mod source;
pub mod time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::{CheckId, RuleId};

pub use source::{SourceHash, hash_source_identifier};
pub use time::{Clock, FixedClock, SystemClock, check_freshness, normalize_observed_at};

/// Input record produced by the external attestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Globally unique identifier, the replay key
    pub attestation_id: String,
    pub subject_id: String,
    /// Resource locator the attestor fetched (URL, endpoint, ...)
    pub claimed_source_identifier: String,
    /// Opaque payload, typically serialized key/value content
    pub raw_data: String,
    /// Observation timestamp in seconds or milliseconds (see [`normalize_observed_at`])
    pub observed_at: u64,
}

/// A validation request: one attestation checked against one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub attestation: Attestation,
    /// Identity submitting the attestation
    pub caller: String,
    pub rule_id: RuleId,
    /// Checks to run, in order. Unknown or inactive ids are skipped.
    pub check_ids: Vec<CheckId>,
}

/// Outcome of a single executed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check_id: CheckId,
    pub plugin_ref: String,
    pub weight: u32,
    pub passed: bool,
    /// Value the plugin extracted, `None` when extraction failed
    pub extracted_value: Option<f64>,
    /// Plugin error that downgraded this check to a failure
    pub error: Option<String>,
}

/// Immutable record of one accepted attestation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub attestation_id: String,
    pub subject_id: String,
    pub rule_id: RuleId,
    pub outcomes: Vec<CheckOutcome>,
    /// Weighted pass ratio, 0-100
    pub aggregate_score: u8,
    pub accepted_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn passed_checks(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed_checks(&self) -> usize {
        self.outcomes.len() - self.passed_checks()
    }
}
