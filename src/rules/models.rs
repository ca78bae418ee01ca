use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::attestation::SourceHash;

/// Rule identifier, issued once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Check identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckId(pub Uuid);

impl CheckId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CheckId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CheckId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Policy for one information source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: RuleId,

    /// Commitment to the expected resource locator. Immutable.
    pub source_identifier_hash: SourceHash,

    /// Field the checks read from the attestation payload
    pub data_key_name: String,

    /// Maximum tolerated attestation age, in seconds
    pub freshness_window_secs: u64,

    pub active: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One weighted, pluggable validation bound to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub check_id: CheckId,
    pub rule_id: RuleId,

    /// Registry key of the plugin that runs this check
    pub plugin_ref: String,

    /// Opaque plugin configuration
    pub params: serde_json::Value,

    /// Strictly positive
    pub weight: u32,

    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_strings() {
        let rule_id = RuleId::new();
        assert_eq!(rule_id.to_string().parse::<RuleId>().unwrap(), rule_id);
        assert!("not-a-uuid".parse::<CheckId>().is_err());
        assert_ne!(CheckId::new(), CheckId::new());
    }
}
