//! External Collaborators
//!
//! The engine consumes two services it does not own:
//!
//! - [`OwnershipOracle`]: resolves which identity owns a subject
//! - [`ReputationSink`]: receives accepted scores for a longer-lived ledger
//!
//! Both calls are the only suspension points of a validation and are bounded
//! by the validator's collaborator timeout. In-memory implementations are
//! provided for embedding and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::attestation::ValidationResult;
use crate::rules::RuleId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Identity/ownership lookup.
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    /// Identity that owns `subject_id`.
    async fn owner_of(&self, subject_id: &str) -> Result<String, CollaboratorError>;
}

/// Context forwarded with every recorded score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkMetadata {
    pub attestation_id: String,
    pub rule_id: RuleId,
    pub passed_checks: usize,
    pub executed_checks: usize,
    pub accepted_at: DateTime<Utc>,
}

impl From<&ValidationResult> for SinkMetadata {
    fn from(result: &ValidationResult) -> Self {
        Self {
            attestation_id: result.attestation_id.clone(),
            rule_id: result.rule_id,
            passed_checks: result.passed_checks(),
            executed_checks: result.outcomes.len(),
            accepted_at: result.accepted_at,
        }
    }
}

/// Downstream reputation ledger. Delivery is fire-and-confirm; the engine
/// does not retry on the sink's behalf.
#[async_trait]
pub trait ReputationSink: Send + Sync {
    async fn record(
        &self,
        subject_id: &str,
        score: u8,
        metadata: &SinkMetadata,
    ) -> Result<(), CollaboratorError>;
}

/// Fixed subject → owner table.
#[derive(Debug, Default)]
pub struct StaticOwnershipRegistry {
    owners: DashMap<String, String>,
}

impl StaticOwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subject_id: &str, owner: &str) {
        self.owners.insert(subject_id.to_string(), owner.to_string());
    }

    pub fn unregister(&self, subject_id: &str) -> Option<String> {
        self.owners.remove(subject_id).map(|(_, owner)| owner)
    }
}

#[async_trait]
impl OwnershipOracle for StaticOwnershipRegistry {
    async fn owner_of(&self, subject_id: &str) -> Result<String, CollaboratorError> {
        self.owners
            .get(subject_id)
            .map(|owner| owner.clone())
            .ok_or_else(|| CollaboratorError::SubjectNotFound(subject_id.to_string()))
    }
}

/// One score delivered to a [`MemoryReputationSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedScore {
    pub subject_id: String,
    pub score: u8,
    pub metadata: SinkMetadata,
}

/// Sink that keeps every delivered score in memory.
#[derive(Debug, Default)]
pub struct MemoryReputationSink {
    records: RwLock<Vec<RecordedScore>>,
}

impl MemoryReputationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<RecordedScore> {
        self.records.read().await.clone()
    }

    pub async fn records_for(&self, subject_id: &str) -> Vec<RecordedScore> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReputationSink for MemoryReputationSink {
    async fn record(
        &self,
        subject_id: &str,
        score: u8,
        metadata: &SinkMetadata,
    ) -> Result<(), CollaboratorError> {
        debug!(subject_id = %subject_id, score = score, "Score recorded");
        self.records.write().await.push(RecordedScore {
            subject_id: subject_id.to_string(),
            score,
            metadata: metadata.clone(),
        });
        Ok(())
    }
}
