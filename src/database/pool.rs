//! Database Connection Pool using sqlx

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::processed::ProcessedRepository;
use crate::database::rules::RuleRepository;
use crate::replay::{ClaimStore, ProcessedOutcome, ProcessedRecord};
use crate::rules::{CatalogStore, Check, CheckId, Rule, RuleId};

pub struct DatabasePool {
    pool: PgPool,
    rules: RuleRepository,
    processed: ProcessedRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        Ok(Self::from_pool(pool))
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, String> {
        Self::new(&config.postgres_url, config.max_connections).await
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let rules = RuleRepository::new(pool.clone());
        let processed = ProcessedRepository::new(pool.clone());

        Self {
            pool,
            rules,
            processed,
        }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS attestation")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create attestation schema: {}", e))?;

        self.rules.init_schema().await?;
        self.processed.init_schema().await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }

    pub fn processed(&self) -> &ProcessedRepository {
        &self.processed
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for DatabasePool {
    async fn insert_rule(&self, rule: &Rule) -> Result<(), String> {
        self.rules.insert_rule(rule).await
    }

    async fn set_rule_active(&self, rule_id: &RuleId, active: bool) -> Result<(), String> {
        self.rules.set_rule_active(rule_id, active).await
    }

    async fn insert_check(&self, check: &Check) -> Result<(), String> {
        self.rules.insert_check(check).await
    }

    async fn deactivate_check(&self, check_id: &CheckId) -> Result<(), String> {
        self.rules.deactivate_check(check_id).await
    }
}

#[async_trait]
impl ClaimStore for DatabasePool {
    async fn try_insert(&self, record: &ProcessedRecord) -> Result<bool, String> {
        self.processed.try_insert(record).await
    }

    async fn settle(
        &self,
        attestation_id: &str,
        outcome: &ProcessedOutcome,
        settled_at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.processed.settle(attestation_id, outcome, settled_at).await
    }

    async fn get(&self, attestation_id: &str) -> Result<Option<ProcessedRecord>, String> {
        self.processed.get(attestation_id).await
    }
}
