//! Rule Repository - persistence of rules and checks
//!
//! Rows are append-only except for the `active` column.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::attestation::SourceHash;
use crate::rules::{Check, CheckId, Rule, RuleId};

pub struct RuleRepository {
    pool: PgPool,
}

impl RuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create rule and check tables
    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS attestation.rules (
                rule_id UUID PRIMARY KEY,
                source_identifier_hash VARCHAR(64) NOT NULL,
                data_key_name VARCHAR(255) NOT NULL,
                freshness_window_secs BIGINT NOT NULL CHECK (freshness_window_secs > 0),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create rules table: {}", e))?;

        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS attestation.checks (
                check_id UUID PRIMARY KEY,
                rule_id UUID NOT NULL REFERENCES attestation.rules(rule_id),
                plugin_ref VARCHAR(64) NOT NULL,
                params JSONB NOT NULL,
                weight BIGINT NOT NULL CHECK (weight > 0),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create checks table: {}", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_checks_rule ON attestation.checks(rule_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create checks index: {}", e))?;

        info!("Rule tables initialized");
        Ok(())
    }

    pub async fn insert_rule(&self, rule: &Rule) -> Result<(), String> {
        sqlx::query(r#"
            INSERT INTO attestation.rules
                (rule_id, source_identifier_hash, data_key_name, freshness_window_secs,
                 active, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#)
        .bind(rule.rule_id.0)
        .bind(rule.source_identifier_hash.as_str())
        .bind(&rule.data_key_name)
        .bind(rule.freshness_window_secs as i64)
        .bind(rule.active)
        .bind(&rule.description)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert rule: {}", e))?;

        debug!(rule_id = %rule.rule_id, "Rule persisted");
        Ok(())
    }

    pub async fn set_rule_active(&self, rule_id: &RuleId, active: bool) -> Result<(), String> {
        let result = sqlx::query("UPDATE attestation.rules SET active = $2 WHERE rule_id = $1")
            .bind(rule_id.0)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to update rule: {}", e))?;

        if result.rows_affected() == 0 {
            return Err(format!("Rule {} missing from database", rule_id));
        }
        Ok(())
    }

    pub async fn insert_check(&self, check: &Check) -> Result<(), String> {
        sqlx::query(r#"
            INSERT INTO attestation.checks
                (check_id, rule_id, plugin_ref, params, weight, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#)
        .bind(check.check_id.0)
        .bind(check.rule_id.0)
        .bind(&check.plugin_ref)
        .bind(&check.params)
        .bind(i64::from(check.weight))
        .bind(check.active)
        .bind(check.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert check: {}", e))?;

        debug!(check_id = %check.check_id, "Check persisted");
        Ok(())
    }

    pub async fn deactivate_check(&self, check_id: &CheckId) -> Result<(), String> {
        let result = sqlx::query("UPDATE attestation.checks SET active = FALSE WHERE check_id = $1")
            .bind(check_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to deactivate check: {}", e))?;

        if result.rows_affected() == 0 {
            return Err(format!("Check {} missing from database", check_id));
        }
        Ok(())
    }

    pub async fn load_rules(&self) -> Result<Vec<Rule>, String> {
        let rows = sqlx::query(r#"
            SELECT rule_id, source_identifier_hash, data_key_name, freshness_window_secs,
                   active, description, created_at
            FROM attestation.rules
            ORDER BY created_at
        "#)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load rules: {}", e))?;

        rows.iter().map(row_to_rule).collect()
    }

    pub async fn load_checks(&self) -> Result<Vec<Check>, String> {
        let rows = sqlx::query(r#"
            SELECT check_id, rule_id, plugin_ref, params, weight, active, created_at
            FROM attestation.checks
            ORDER BY created_at
        "#)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load checks: {}", e))?;

        rows.iter().map(row_to_check).collect()
    }
}

fn row_to_rule(row: &PgRow) -> Result<Rule, String> {
    let rule_id: Uuid = row.get("rule_id");
    let hash: String = row.get("source_identifier_hash");
    let window: i64 = row.get("freshness_window_secs");
    let created_at: DateTime<Utc> = row.get("created_at");

    let source_identifier_hash = SourceHash::from_hex(hash)
        .ok_or_else(|| format!("Rule {} has a corrupt source hash", rule_id))?;

    Ok(Rule {
        rule_id: RuleId(rule_id),
        source_identifier_hash,
        data_key_name: row.get("data_key_name"),
        freshness_window_secs: u64::try_from(window)
            .map_err(|_| format!("Rule {} has a negative freshness window", rule_id))?,
        active: row.get("active"),
        description: row.get("description"),
        created_at,
    })
}

fn row_to_check(row: &PgRow) -> Result<Check, String> {
    let check_id: Uuid = row.get("check_id");
    let rule_id: Uuid = row.get("rule_id");
    let weight: i64 = row.get("weight");
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(Check {
        check_id: CheckId(check_id),
        rule_id: RuleId(rule_id),
        plugin_ref: row.get("plugin_ref"),
        params: row.get("params"),
        weight: u32::try_from(weight)
            .map_err(|_| format!("Check {} has an out of range weight", check_id))?,
        active: row.get("active"),
        created_at,
    })
}
