//! Processed Repository - durable replay claims
//!
//! Rows are never deleted. Claim insertion relies on the primary key plus
//! `ON CONFLICT DO NOTHING`, which makes it an atomic insert-if-absent.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgPool;
use tracing::info;

use crate::replay::{ProcessedOutcome, ProcessedRecord};

pub struct ProcessedRepository {
    pool: PgPool,
}

impl ProcessedRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS attestation.processed (
                attestation_id VARCHAR(512) PRIMARY KEY,
                claimed_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                outcome JSONB NOT NULL,
                settled_at TIMESTAMP WITH TIME ZONE
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create processed table: {}", e))?;

        info!("Processed table initialized");
        Ok(())
    }

    /// Insert a claim. Returns `false` if the id was already present.
    pub async fn try_insert(&self, record: &ProcessedRecord) -> Result<bool, String> {
        let outcome = serde_json::to_value(&record.outcome)
            .map_err(|e| format!("Failed to encode outcome: {}", e))?;

        let result = sqlx::query(r#"
            INSERT INTO attestation.processed (attestation_id, claimed_at, outcome)
            VALUES ($1, $2, $3)
            ON CONFLICT (attestation_id) DO NOTHING
        "#)
        .bind(&record.attestation_id)
        .bind(record.claimed_at)
        .bind(outcome)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert processed record: {}", e))?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn settle(
        &self,
        attestation_id: &str,
        outcome: &ProcessedOutcome,
        settled_at: DateTime<Utc>,
    ) -> Result<(), String> {
        let outcome = serde_json::to_value(outcome)
            .map_err(|e| format!("Failed to encode outcome: {}", e))?;

        sqlx::query(r#"
            UPDATE attestation.processed
            SET outcome = $2, settled_at = $3
            WHERE attestation_id = $1
        "#)
        .bind(attestation_id)
        .bind(outcome)
        .bind(settled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to settle processed record: {}", e))?;

        Ok(())
    }

    pub async fn get(&self, attestation_id: &str) -> Result<Option<ProcessedRecord>, String> {
        let row = sqlx::query(r#"
            SELECT attestation_id, claimed_at, outcome, settled_at
            FROM attestation.processed
            WHERE attestation_id = $1
        "#)
        .bind(attestation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get processed record: {}", e))?;

        match row {
            Some(row) => {
                let outcome: serde_json::Value = row.get("outcome");
                let outcome: ProcessedOutcome = serde_json::from_value(outcome)
                    .map_err(|e| format!("Corrupt outcome for {}: {}", attestation_id, e))?;

                Ok(Some(ProcessedRecord {
                    attestation_id: row.get("attestation_id"),
                    claimed_at: row.get("claimed_at"),
                    outcome,
                    settled_at: row.get("settled_at"),
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<i64, String> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM attestation.processed")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| format!("Failed to count processed records: {}", e))?;

        Ok(row.get("total"))
    }
}
