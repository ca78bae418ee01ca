//! Replay Guard
//!
//! Exactly-once enforcement keyed by attestation id. The claim is taken
//! before any validation logic runs and is never released, so a rejected
//! attestation can not be resubmitted either.
//!
//! | State | Meaning |
//! |-------|---------|
//! | absent | never seen, claimable |
//! | `Pending` | claimed, validation in flight |
//! | `Accepted` | validated and scored |
//! | `Rejected` | definitively rejected, still consumed |
//! | `Unresolved` | a collaborator or storage failed, still consumed |
//!
//! Within a process the claim is a `DashMap` insert-if-absent. With a
//! database attached the claim is also an `INSERT .. ON CONFLICT DO NOTHING`,
//! which keeps it atomic across processes sharing the table. Settled records
//! then live only in the table, so memory holds in-flight claims only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::database::pool::DatabasePool;
use crate::error::{EngineError, Result};

/// Final state of a claimed attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessedOutcome {
    Pending,
    Accepted { score: u8 },
    Rejected { reason: String },
    Unresolved { reason: String },
}

impl ProcessedOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ProcessedOutcome::Pending => "pending",
            ProcessedOutcome::Accepted { .. } => "accepted",
            ProcessedOutcome::Rejected { .. } => "rejected",
            ProcessedOutcome::Unresolved { .. } => "unresolved",
        }
    }
}

/// Durable marker that an attestation id has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub attestation_id: String,
    pub claimed_at: DateTime<Utc>,
    pub outcome: ProcessedOutcome,
    pub settled_at: Option<DateTime<Utc>>,
}

impl ProcessedRecord {
    pub fn claimed(attestation_id: &str) -> Self {
        Self {
            attestation_id: attestation_id.to_string(),
            claimed_at: Utc::now(),
            outcome: ProcessedOutcome::Pending,
            settled_at: None,
        }
    }
}

/// Durable claim table shared between processes.
///
/// Implemented by [`DatabasePool`]. `try_insert` must be an atomic
/// insert-if-absent.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn try_insert(&self, record: &ProcessedRecord) -> std::result::Result<bool, String>;

    async fn settle(
        &self,
        attestation_id: &str,
        outcome: &ProcessedOutcome,
        settled_at: DateTime<Utc>,
    ) -> std::result::Result<(), String>;

    async fn get(
        &self,
        attestation_id: &str,
    ) -> std::result::Result<Option<ProcessedRecord>, String>;
}

/// In-memory records are every claim when running standalone. With a
/// [`ClaimStore`] attached they are only the claims still in flight; settled
/// records live in the store.
#[derive(Default)]
pub struct ReplayGuard {
    records: DashMap<String, ProcessedRecord>,
    store: Option<Arc<dyn ClaimStore>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, db: Arc<DatabasePool>) -> Self {
        self.with_store(db)
    }

    pub fn with_store(mut self, store: Arc<dyn ClaimStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Claim `attestation_id`. Returns `true` exactly once per id.
    ///
    /// A storage error leaves the id claimed locally: the engine would rather
    /// refuse a legitimate attestation than risk scoring one twice.
    pub async fn try_claim(&self, attestation_id: &str) -> Result<bool> {
        let record = ProcessedRecord::claimed(attestation_id);

        match self.records.entry(attestation_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(attestation_id = %attestation_id, "Claim refused, already processed");
                return Ok(false);
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        if let Some(ref store) = self.store {
            let inserted = store
                .try_insert(&record)
                .await
                .map_err(EngineError::Storage)?;

            if !inserted {
                // Claimed earlier or by another process; the store keeps the record
                self.records.remove(attestation_id);
                debug!(attestation_id = %attestation_id, "Claim refused by database");
                return Ok(false);
            }
        }

        debug!(attestation_id = %attestation_id, "Attestation claimed");
        Ok(true)
    }

    /// Record the final outcome of a claimed attestation.
    ///
    /// Once the store has the outcome the in-memory entry is dropped.
    pub async fn settle(&self, attestation_id: &str, outcome: ProcessedOutcome) -> Result<()> {
        let settled_at = Utc::now();

        if let Some(mut record) = self.records.get_mut(attestation_id) {
            record.outcome = outcome.clone();
            record.settled_at = Some(settled_at);
        }

        if let Some(ref store) = self.store {
            store
                .settle(attestation_id, &outcome, settled_at)
                .await
                .map_err(EngineError::Storage)?;
            self.records.remove(attestation_id);
        }

        Ok(())
    }

    /// Whether the id is held in memory: every claim when standalone, only
    /// in-flight claims with a store attached. See [`ReplayGuard::fetch`].
    pub fn is_processed(&self, attestation_id: &str) -> bool {
        self.records.contains_key(attestation_id)
    }

    /// In-memory record, if any.
    pub fn record(&self, attestation_id: &str) -> Option<ProcessedRecord> {
        self.records.get(attestation_id).map(|r| r.clone())
    }

    /// Record from memory, falling back to the store.
    pub async fn fetch(&self, attestation_id: &str) -> Result<Option<ProcessedRecord>> {
        if let Some(record) = self.record(attestation_id) {
            return Ok(Some(record));
        }

        match self.store {
            Some(ref store) => store.get(attestation_id).await.map_err(EngineError::Storage),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
