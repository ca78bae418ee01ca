//! Rule Store - catalog of rules and checks
//!
//! The catalog is held behind an `Arc` and replaced copy-on-write: a
//! validation takes one [`RuleCatalog`] snapshot and keeps reading from it
//! while administrative mutations build and install a new version.
//!
//! Mutations are serialized by an admin mutex and persisted before the new
//! version is swapped in. The catalog write lock is held only for the swap,
//! never across storage I/O, so snapshots never wait on the database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::attestation::hash_source_identifier;
use crate::audit::AuditLogger;
use crate::checks::PluginRegistry;
use crate::database::pool::DatabasePool;
use crate::error::{EngineError, Result};
use crate::rules::{Check, CheckId, Rule, RuleId};

/// Point-in-time view of all rules and checks.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: HashMap<RuleId, Rule>,
    checks: HashMap<CheckId, Check>,
    /// Checks per rule, in creation order
    checks_by_rule: HashMap<RuleId, Vec<CheckId>>,
    version: u64,
}

impl RuleCatalog {
    pub fn rule(&self, rule_id: &RuleId) -> Option<&Rule> {
        self.rules.get(rule_id)
    }

    pub fn check(&self, check_id: &CheckId) -> Option<&Check> {
        self.checks.get(check_id)
    }

    /// All checks of a rule (active or not), in creation order.
    pub fn checks_for_rule(&self, rule_id: &RuleId) -> Vec<&Check> {
        self.checks_by_rule
            .get(rule_id)
            .map(|ids| ids.iter().filter_map(|id| self.checks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Resolve a requested check for execution against `rule_id`: it must
    /// exist, belong to the rule and be active.
    pub fn runnable_check(&self, rule_id: &RuleId, check_id: &CheckId) -> Option<&Check> {
        self.checks
            .get(check_id)
            .filter(|check| check.rule_id == *rule_id && check.active)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Monotonic counter bumped on every installed mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn insert_rule(&mut self, rule: Rule) {
        self.checks_by_rule.entry(rule.rule_id).or_default();
        self.rules.insert(rule.rule_id, rule);
        self.version += 1;
    }

    fn insert_check(&mut self, check: Check) {
        self.checks_by_rule
            .entry(check.rule_id)
            .or_default()
            .push(check.check_id);
        self.checks.insert(check.check_id, check);
        self.version += 1;
    }
}

/// Durable backing for catalog mutations.
///
/// Implemented by [`DatabasePool`]. Every mutation is written here before the
/// new catalog version is installed in memory.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_rule(&self, rule: &Rule) -> std::result::Result<(), String>;

    async fn set_rule_active(
        &self,
        rule_id: &RuleId,
        active: bool,
    ) -> std::result::Result<(), String>;

    async fn insert_check(&self, check: &Check) -> std::result::Result<(), String>;

    async fn deactivate_check(&self, check_id: &CheckId) -> std::result::Result<(), String>;
}

/// Owner of the rule/check catalog and the administrative API.
pub struct RuleStore {
    catalog: RwLock<Arc<RuleCatalog>>,
    /// Serializes mutations; the catalog lock is only taken to swap versions
    admin: Mutex<()>,
    persistence: Option<Arc<dyn CatalogStore>>,
    plugins: Option<Arc<PluginRegistry>>,
    audit: Option<Arc<AuditLogger>>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore {
    /// Empty in-memory store.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Arc::new(RuleCatalog::default())),
            admin: Mutex::new(()),
            persistence: None,
            plugins: None,
            audit: None,
        }
    }

    /// Load the persisted catalog and write all further mutations through.
    pub async fn load(db: Arc<DatabasePool>) -> Result<Self> {
        let rules = db.rules().load_rules().await.map_err(EngineError::Storage)?;
        let checks = db.rules().load_checks().await.map_err(EngineError::Storage)?;

        let mut catalog = RuleCatalog::default();
        for rule in rules {
            catalog.insert_rule(rule);
        }
        for check in checks {
            catalog.insert_check(check);
        }

        info!(
            rules = catalog.rule_count(),
            checks = catalog.check_count(),
            "Loaded rule catalog from database"
        );

        Ok(Self {
            catalog: RwLock::new(Arc::new(catalog)),
            ..Self::new()
        }
        .with_database(db))
    }

    pub fn with_database(self, db: Arc<DatabasePool>) -> Self {
        self.with_persistence(db)
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn CatalogStore>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Reject checks whose plugin is unknown or whose params it refuses.
    pub fn with_plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Current catalog. The returned snapshot never changes.
    pub async fn snapshot(&self) -> Arc<RuleCatalog> {
        self.catalog.read().await.clone()
    }

    pub async fn get_rule(&self, rule_id: &RuleId) -> Option<Rule> {
        self.snapshot().await.rule(rule_id).cloned()
    }

    pub async fn list_rules(&self) -> Vec<Rule> {
        let snapshot = self.snapshot().await;
        let mut rules: Vec<Rule> = snapshot.rules().cloned().collect();
        rules.sort_by_key(|r| r.created_at);
        rules
    }

    pub async fn checks_for_rule(&self, rule_id: &RuleId) -> Vec<Check> {
        self.snapshot()
            .await
            .checks_for_rule(rule_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Replace the live catalog. Callers hold the admin lock.
    async fn install(&self, catalog: RuleCatalog) {
        *self.catalog.write().await = Arc::new(catalog);
    }

    /// Create a rule for `source_identifier`. Only the hash of the identifier is kept.
    pub async fn add_rule(
        &self,
        source_identifier: &str,
        data_key_name: &str,
        freshness_window_secs: i64,
        description: &str,
    ) -> Result<RuleId> {
        if freshness_window_secs <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "freshness window must be positive, got {}",
                freshness_window_secs
            )));
        }
        if source_identifier.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "source identifier cannot be empty".to_string(),
            ));
        }
        if data_key_name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "data key name cannot be empty".to_string(),
            ));
        }

        let rule = Rule {
            rule_id: RuleId::new(),
            source_identifier_hash: hash_source_identifier(source_identifier),
            data_key_name: data_key_name.to_string(),
            freshness_window_secs: freshness_window_secs as u64,
            active: true,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        let rule_id = rule.rule_id;

        {
            let _admin = self.admin.lock().await;
            if let Some(ref persistence) = self.persistence {
                persistence.insert_rule(&rule).await.map_err(EngineError::Storage)?;
            }

            let mut next = (*self.snapshot().await).clone();
            next.insert_rule(rule);
            self.install(next).await;
        }

        info!(
            rule_id = %rule_id,
            data_key = %data_key_name,
            freshness_window_secs = freshness_window_secs,
            "Rule added"
        );
        if let Some(ref audit) = self.audit {
            audit.log_rule_added(&rule_id, data_key_name).await;
        }

        Ok(rule_id)
    }

    pub async fn activate_rule(&self, rule_id: &RuleId) -> Result<()> {
        self.set_rule_active(rule_id, true).await
    }

    pub async fn deactivate_rule(&self, rule_id: &RuleId) -> Result<()> {
        self.set_rule_active(rule_id, false).await
    }

    async fn set_rule_active(&self, rule_id: &RuleId, active: bool) -> Result<()> {
        {
            let _admin = self.admin.lock().await;
            let mut next = (*self.snapshot().await).clone();
            let rule = next
                .rules
                .get_mut(rule_id)
                .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;

            if rule.active == active {
                debug!(rule_id = %rule_id, active = active, "Rule already in requested state");
                return Ok(());
            }

            if let Some(ref persistence) = self.persistence {
                persistence
                    .set_rule_active(rule_id, active)
                    .await
                    .map_err(EngineError::Storage)?;
            }

            rule.active = active;
            next.version += 1;
            self.install(next).await;
        }

        info!(rule_id = %rule_id, active = active, "Rule state changed");
        if let Some(ref audit) = self.audit {
            audit.log_rule_state_changed(rule_id, active).await;
        }

        Ok(())
    }

    /// Attach a check to a rule.
    pub async fn add_check(
        &self,
        rule_id: &RuleId,
        plugin_ref: &str,
        params: serde_json::Value,
        weight: i64,
    ) -> Result<CheckId> {
        if weight <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "check weight must be positive, got {}",
                weight
            )));
        }
        let weight = u32::try_from(weight).map_err(|_| {
            EngineError::InvalidInput(format!("check weight {} exceeds {}", weight, u32::MAX))
        })?;

        let check_id = {
            let _admin = self.admin.lock().await;
            let mut next = (*self.snapshot().await).clone();
            if next.rule(rule_id).is_none() {
                return Err(EngineError::RuleNotFound(rule_id.to_string()));
            }

            if let Some(ref plugins) = self.plugins {
                plugins
                    .validate_params(plugin_ref, &params)
                    .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
            }

            let check = Check {
                check_id: CheckId::new(),
                rule_id: *rule_id,
                plugin_ref: plugin_ref.to_string(),
                params,
                weight,
                active: true,
                created_at: Utc::now(),
            };
            let check_id = check.check_id;

            if let Some(ref persistence) = self.persistence {
                persistence.insert_check(&check).await.map_err(EngineError::Storage)?;
            }

            next.insert_check(check);
            self.install(next).await;
            check_id
        };

        info!(
            rule_id = %rule_id,
            check_id = %check_id,
            plugin = %plugin_ref,
            weight = weight,
            "Check added"
        );
        if let Some(ref audit) = self.audit {
            audit.log_check_added(rule_id, &check_id, plugin_ref).await;
        }

        Ok(check_id)
    }

    /// Deactivate a check. The check stays in the catalog for audit history.
    pub async fn deactivate_check(&self, check_id: &CheckId) -> Result<()> {
        {
            let _admin = self.admin.lock().await;
            let mut next = (*self.snapshot().await).clone();
            let check = next
                .checks
                .get_mut(check_id)
                .ok_or_else(|| EngineError::CheckNotFound(check_id.to_string()))?;

            if !check.active {
                return Ok(());
            }

            if let Some(ref persistence) = self.persistence {
                persistence
                    .deactivate_check(check_id)
                    .await
                    .map_err(EngineError::Storage)?;
            }

            check.active = false;
            next.version += 1;
            self.install(next).await;
        }

        info!(check_id = %check_id, "Check deactivated");
        if let Some(ref audit) = self.audit {
            audit.log_check_deactivated(check_id).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::LiteralScanExtractor;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    const SOURCE: &str = "https://api.exchange.example/v1/ticker?symbol=BTCUSD";

    /// Persistence whose inserts stall until released.
    #[derive(Default)]
    struct GatedStore {
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        async fn hold(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait]
    impl CatalogStore for GatedStore {
        async fn insert_rule(&self, _rule: &Rule) -> std::result::Result<(), String> {
            self.hold().await;
            Ok(())
        }

        async fn set_rule_active(
            &self,
            _rule_id: &RuleId,
            _active: bool,
        ) -> std::result::Result<(), String> {
            Ok(())
        }

        async fn insert_check(&self, _check: &Check) -> std::result::Result<(), String> {
            self.hold().await;
            Ok(())
        }

        async fn deactivate_check(&self, _check_id: &CheckId) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CatalogStore for FailingStore {
        async fn insert_rule(&self, _rule: &Rule) -> std::result::Result<(), String> {
            Err("connection reset".to_string())
        }

        async fn set_rule_active(
            &self,
            _rule_id: &RuleId,
            _active: bool,
        ) -> std::result::Result<(), String> {
            Err("connection reset".to_string())
        }

        async fn insert_check(&self, _check: &Check) -> std::result::Result<(), String> {
            Err("connection reset".to_string())
        }

        async fn deactivate_check(&self, _check_id: &CheckId) -> std::result::Result<(), String> {
            Err("connection reset".to_string())
        }
    }

    #[tokio::test]
    async fn test_snapshot_not_blocked_by_pending_write() {
        let gate = Arc::new(GatedStore::default());
        let store = Arc::new(RuleStore::new().with_persistence(gate.clone()));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.add_rule(SOURCE, "price", 60, "").await })
        };
        gate.entered.notified().await;

        let snapshot = tokio::time::timeout(Duration::from_millis(200), store.snapshot())
            .await
            .expect("snapshot waited on storage");
        assert_eq!(snapshot.rule_count(), 0);

        gate.release.notify_one();
        let rule_id = pending.await.unwrap().unwrap();
        assert!(store.get_rule(&rule_id).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_write_is_not_installed() {
        let store = RuleStore::new().with_persistence(Arc::new(FailingStore));

        let err = store.add_rule(SOURCE, "price", 60, "").await.unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert_eq!(store.snapshot().await.rule_count(), 0);
        assert_eq!(store.snapshot().await.version(), 0);
    }

    #[tokio::test]
    async fn test_add_rule_stores_hash_only() {
        let store = RuleStore::new();
        let rule_id = store.add_rule(SOURCE, "price", 3600, "BTC spot").await.unwrap();

        let rule = store.get_rule(&rule_id).await.unwrap();
        assert_eq!(rule.source_identifier_hash, hash_source_identifier(SOURCE));
        assert_eq!(rule.freshness_window_secs, 3600);
        assert!(rule.active);
    }

    #[tokio::test]
    async fn test_add_rule_rejects_non_positive_window() {
        let store = RuleStore::new();
        for window in [0, -1] {
            let err = store.add_rule(SOURCE, "price", window, "").await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
        }
        assert!(store.list_rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_activation_is_idempotent() {
        let store = RuleStore::new();
        let rule_id = store.add_rule(SOURCE, "price", 60, "").await.unwrap();

        store.deactivate_rule(&rule_id).await.unwrap();
        store.deactivate_rule(&rule_id).await.unwrap();
        assert!(!store.get_rule(&rule_id).await.unwrap().active);

        store.activate_rule(&rule_id).await.unwrap();
        store.activate_rule(&rule_id).await.unwrap();
        assert!(store.get_rule(&rule_id).await.unwrap().active);

        let unknown = RuleId::new();
        assert!(matches!(
            store.activate_rule(&unknown).await,
            Err(EngineError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_check_validation() {
        let store = RuleStore::new();
        let rule_id = store.add_rule(SOURCE, "price", 60, "").await.unwrap();

        assert!(matches!(
            store.add_check(&rule_id, "range", json!({"min": 0, "max": 1}), 0).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            store.add_check(&RuleId::new(), "range", json!({"min": 0, "max": 1}), 10).await,
            Err(EngineError::RuleNotFound(_))
        ));

        let check_id = store
            .add_check(&rule_id, "range", json!({"min": 0, "max": 1}), 10)
            .await
            .unwrap();
        let checks = store.checks_for_rule(&rule_id).await;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].check_id, check_id);
        assert_eq!(checks[0].weight, 10);
    }

    #[tokio::test]
    async fn test_plugin_params_checked_when_registry_attached() {
        let registry = Arc::new(PluginRegistry::with_defaults(Arc::new(LiteralScanExtractor)));
        let store = RuleStore::new().with_plugins(registry);
        let rule_id = store.add_rule(SOURCE, "price", 60, "").await.unwrap();

        assert!(matches!(
            store.add_check(&rule_id, "regex", json!({}), 10).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            store.add_check(&rule_id, "range", json!({"min": 9, "max": 1}), 10).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(store.checks_for_rule(&rule_id).await.is_empty());

        // A missing rule is reported before the plugin is looked at
        assert!(matches!(
            store.add_check(&RuleId::new(), "bogus", json!({}), 10).await,
            Err(EngineError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivated_check_is_kept() {
        let store = RuleStore::new();
        let rule_id = store.add_rule(SOURCE, "price", 60, "").await.unwrap();
        let check_id = store
            .add_check(&rule_id, "range", json!({"min": 0, "max": 1}), 10)
            .await
            .unwrap();

        store.deactivate_check(&check_id).await.unwrap();
        store.deactivate_check(&check_id).await.unwrap();

        let snapshot = store.snapshot().await;
        assert!(!snapshot.check(&check_id).unwrap().active);
        assert!(snapshot.runnable_check(&rule_id, &check_id).is_none());
        assert_eq!(snapshot.check_count(), 1);

        assert!(matches!(
            store.deactivate_check(&CheckId::new()).await,
            Err(EngineError::CheckNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_isolated_from_later_mutations() {
        let store = RuleStore::new();
        let rule_id = store.add_rule(SOURCE, "price", 60, "").await.unwrap();

        let before = store.snapshot().await;
        store.deactivate_rule(&rule_id).await.unwrap();
        store
            .add_check(&rule_id, "range", json!({"min": 0, "max": 1}), 5)
            .await
            .unwrap();

        assert!(before.rule(&rule_id).unwrap().active);
        assert!(before.checks_for_rule(&rule_id).is_empty());

        let after = store.snapshot().await;
        assert!(!after.rule(&rule_id).unwrap().active);
        assert!(after.version() > before.version());
    }

    #[tokio::test]
    async fn test_runnable_check_requires_matching_rule() {
        let store = RuleStore::new();
        let rule_a = store.add_rule(SOURCE, "price", 60, "").await.unwrap();
        let rule_b = store.add_rule(SOURCE, "volume", 60, "").await.unwrap();
        let check = store
            .add_check(&rule_a, "range", json!({"min": 0, "max": 1}), 5)
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        assert!(snapshot.runnable_check(&rule_a, &check).is_some());
        assert!(snapshot.runnable_check(&rule_b, &check).is_none());
    }
}
