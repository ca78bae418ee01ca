//! Attestation Validator - Main Orchestrator
//!
//! Runs one attestation through a fixed pipeline. The first terminal failure
//! short-circuits everything after it.
//!
//! ```text
//! 1. Claim      ReplayGuard::try_claim          DuplicateAttestation
//! 2. Ownership  OwnershipOracle::owner_of       OwnershipMismatch / SubjectNotFound
//! 3. Rule       RuleStore snapshot              RuleNotFound / RuleInactive
//! 4. Source     hash(claimed) == rule hash      SourceMismatch
//! 5. Freshness  0 <= now - observed <= window   AttestationExpired
//! 6. Checks     CheckPlugin x N                 (failures lower the score)
//! 7. Aggregate  ScoreAggregator
//! 8. Commit     ReputationSink::record          CollaboratorUnavailable (result attached)
//! ```
//!
//! ## Replay semantics
//! The claim is taken before anything else and is never released. A
//! rejected, unresolved or sink-failed attestation can not be resubmitted.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::attestation::{
    CheckOutcome, Clock, SystemClock, ValidationRequest, ValidationResult, check_freshness,
    hash_source_identifier, normalize_observed_at,
};
use crate::audit::AuditLogger;
use crate::checks::{PluginError, PluginRegistry};
use crate::collaborators::{CollaboratorError, OwnershipOracle, ReputationSink, SinkMetadata};
use crate::config::{EngineConfig, OwnershipMode, ValidationConfig, sanitize_for_logging};
use crate::database::pool::DatabasePool;
use crate::error::{EngineError, Result};
use crate::replay::{ProcessedOutcome, ReplayGuard};
use crate::rules::{Check, RuleCatalog, RuleId, RuleStore};
use crate::scoring::ScoreAggregator;

const OWNERSHIP_ORACLE: &str = "ownership_oracle";
const REPUTATION_SINK: &str = "reputation_sink";

pub struct AttestationValidator {
    rules: Arc<RuleStore>,
    replay: Arc<ReplayGuard>,
    plugins: Arc<PluginRegistry>,
    aggregator: ScoreAggregator,
    ownership: Arc<dyn OwnershipOracle>,
    sink: Arc<dyn ReputationSink>,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<AuditLogger>>,
    config: ValidationConfig,
    sanitize_logs: bool,
}

impl AttestationValidator {
    pub fn new(
        rules: Arc<RuleStore>,
        replay: Arc<ReplayGuard>,
        plugins: Arc<PluginRegistry>,
        ownership: Arc<dyn OwnershipOracle>,
        sink: Arc<dyn ReputationSink>,
    ) -> Self {
        Self {
            rules,
            replay,
            plugins,
            aggregator: ScoreAggregator::new(),
            ownership,
            sink,
            clock: Arc::new(SystemClock),
            audit: None,
            config: ValidationConfig::default(),
            sanitize_logs: true,
        }
    }

    /// Assemble a validator and its stores from configuration.
    ///
    /// With PostgreSQL enabled the schema is created if missing, the rule
    /// catalog is loaded and replay claims are persisted.
    pub async fn from_config(
        config: &EngineConfig,
        ownership: Arc<dyn OwnershipOracle>,
        sink: Arc<dyn ReputationSink>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let audit = Arc::new(
            AuditLogger::new()
                .with_max_entries(config.audit.max_entries)
                .with_min_severity(config.audit.min_severity),
        );
        let plugins = Arc::new(PluginRegistry::with_defaults(
            config.validation.extraction.build(),
        ));

        let (rules, replay) = if config.database.postgres_enabled {
            let db = Arc::new(
                DatabasePool::from_config(&config.database)
                    .await
                    .map_err(|e| anyhow::anyhow!(e))?,
            );
            db.init_schema().await.map_err(|e| anyhow::anyhow!(e))?;

            let rules = RuleStore::load(db.clone()).await?;
            (rules, ReplayGuard::new().with_database(db))
        } else {
            warn!("PostgreSQL disabled, rules and replay claims will not survive a restart");
            (RuleStore::new(), ReplayGuard::new())
        };

        let rules = rules.with_plugins(plugins.clone()).with_audit(audit.clone());

        info!(
            plugins = ?plugins.plugin_refs(),
            ownership_mode = ?config.validation.ownership_mode,
            "Attestation validator initialized"
        );

        Ok(Self::new(Arc::new(rules), Arc::new(replay), plugins, ownership, sink)
            .with_config(config.validation.clone())
            .with_audit(audit)
            .with_log_sanitization(config.logging.sanitize_logs))
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_log_sanitization(mut self, sanitize: bool) -> Self {
        self.sanitize_logs = sanitize;
        self
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn replay_guard(&self) -> &Arc<ReplayGuard> {
        &self.replay
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn audit(&self) -> Option<&Arc<AuditLogger>> {
        self.audit.as_ref()
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate with the configured collaborator timeout.
    pub async fn validate(&self, request: ValidationRequest) -> Result<ValidationResult> {
        let timeout = self.config.collaborator_timeout();
        self.validate_with_timeout(request, timeout).await
    }

    /// Validate, bounding each collaborator call by `timeout`.
    pub async fn validate_with_timeout(
        &self,
        request: ValidationRequest,
        timeout: Duration,
    ) -> Result<ValidationResult> {
        let attestation_id = request.attestation.attestation_id.as_str();
        let subject_id = request.attestation.subject_id.as_str();

        // Step 1: claim
        match self.replay.try_claim(attestation_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    attestation_id = %attestation_id,
                    caller = %request.caller,
                    "Duplicate attestation rejected"
                );
                if let Some(ref audit) = self.audit {
                    audit.log_replay_attempt(attestation_id, &request.caller).await;
                }
                return Err(EngineError::DuplicateAttestation(attestation_id.to_string()));
            }
            Err(e) => {
                error!(attestation_id = %attestation_id, error = %e, "Replay claim failed");
                self.settle(attestation_id, ProcessedOutcome::Unresolved {
                    reason: e.reason_code().to_string(),
                })
                .await;
                return Err(e);
            }
        }

        // Steps 2-7
        let result = match self.evaluate(&request, timeout).await {
            Ok(result) => result,
            Err(e) => {
                let outcome = if e.is_retryable() {
                    ProcessedOutcome::Unresolved {
                        reason: e.reason_code().to_string(),
                    }
                } else {
                    ProcessedOutcome::Rejected {
                        reason: e.reason_code().to_string(),
                    }
                };

                warn!(
                    attestation_id = %attestation_id,
                    rule_id = %request.rule_id,
                    reason = e.reason_code(),
                    error = %e,
                    "Attestation rejected"
                );
                self.settle(attestation_id, outcome).await;
                if let Some(ref audit) = self.audit {
                    audit.log_rejected(attestation_id, subject_id, e.reason_code()).await;
                }
                return Err(e);
            }
        };

        // Step 8: commit. From here on the attestation counts as validated.
        self.settle(attestation_id, ProcessedOutcome::Accepted {
            score: result.aggregate_score,
        })
        .await;

        info!(
            attestation_id = %attestation_id,
            subject_id = %subject_id,
            rule_id = %result.rule_id,
            score = result.aggregate_score,
            checks_run = result.outcomes.len(),
            "Attestation validated"
        );
        if let Some(ref audit) = self.audit {
            audit
                .log_accepted(
                    attestation_id,
                    subject_id,
                    &result.rule_id,
                    result.aggregate_score,
                    result.outcomes.len(),
                )
                .await;
        }

        self.deliver(result, timeout).await
    }

    /// Steps 2 to 7 of the pipeline, on an already-claimed attestation.
    async fn evaluate(
        &self,
        request: &ValidationRequest,
        timeout: Duration,
    ) -> Result<ValidationResult> {
        let attestation = &request.attestation;

        // Step 2: ownership
        match self.config.ownership_mode {
            OwnershipMode::Enforced => {
                let owner = self
                    .call_collaborator(
                        OWNERSHIP_ORACLE,
                        timeout,
                        self.ownership.owner_of(&attestation.subject_id),
                    )
                    .await?;

                if owner != request.caller {
                    return Err(EngineError::OwnershipMismatch {
                        subject_id: attestation.subject_id.clone(),
                        caller: request.caller.clone(),
                    });
                }
            }
            OwnershipMode::Skipped => {
                debug!(attestation_id = %attestation.attestation_id, "Ownership check skipped");
            }
        }

        // Step 3: rule lookup. The snapshot is used for the rest of the validation.
        let catalog = self.rules.snapshot().await;
        let rule = catalog
            .rule(&request.rule_id)
            .ok_or_else(|| EngineError::RuleNotFound(request.rule_id.to_string()))?;

        if !rule.active {
            return Err(EngineError::RuleInactive(rule.rule_id.to_string()));
        }

        // Step 4: source binding
        let claimed_hash = hash_source_identifier(&attestation.claimed_source_identifier);
        if claimed_hash != rule.source_identifier_hash {
            debug!(
                attestation_id = %attestation.attestation_id,
                claimed_source = %self.loggable(&attestation.claimed_source_identifier),
                "Claimed source does not match rule"
            );
            return Err(EngineError::SourceMismatch {
                rule_id: rule.rule_id.to_string(),
            });
        }

        // Step 5: freshness
        let observed_secs = normalize_observed_at(attestation.observed_at);
        let age_secs = check_freshness(
            observed_secs,
            self.clock.now_secs(),
            rule.freshness_window_secs,
        )?;

        // Step 6: checks
        let outcomes = self.execute_checks(
            &catalog,
            &rule.rule_id,
            &rule.data_key_name,
            &attestation.raw_data,
            &request.check_ids,
        );

        // Step 7: aggregate
        let aggregate_score = self.aggregator.aggregate_outcomes(&outcomes);

        debug!(
            attestation_id = %attestation.attestation_id,
            age_secs = age_secs,
            catalog_version = catalog.version(),
            score = aggregate_score,
            "Attestation evaluated"
        );

        Ok(ValidationResult {
            attestation_id: attestation.attestation_id.clone(),
            subject_id: attestation.subject_id.clone(),
            rule_id: rule.rule_id,
            outcomes,
            aggregate_score,
            accepted_at: self.clock.now(),
        })
    }

    /// Run each requested check that exists, belongs to the rule and is
    /// active. A check id requested twice runs once.
    fn execute_checks(
        &self,
        catalog: &RuleCatalog,
        rule_id: &RuleId,
        data_key_name: &str,
        raw_data: &str,
        check_ids: &[crate::rules::CheckId],
    ) -> Vec<CheckOutcome> {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(check_ids.len());

        for check_id in check_ids {
            if !seen.insert(*check_id) {
                continue;
            }

            let Some(check) = catalog.runnable_check(rule_id, check_id) else {
                debug!(
                    check_id = %check_id,
                    rule_id = %rule_id,
                    "Skipping unknown or inactive check"
                );
                continue;
            };

            outcomes.push(self.run_check(check, data_key_name, raw_data));
        }

        outcomes
    }

    /// Invoke one plugin. Errors and panics both count as a failed check.
    fn run_check(&self, check: &Check, data_key_name: &str, raw_data: &str) -> CheckOutcome {
        let invocation = catch_unwind(AssertUnwindSafe(|| {
            self.plugins
                .run(&check.plugin_ref, data_key_name, raw_data, &check.params)
        }))
        .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload.as_ref()))));

        match invocation {
            Ok(verdict) => {
                debug!(
                    check_id = %check.check_id,
                    plugin = %check.plugin_ref,
                    passed = verdict.passed,
                    value = verdict.extracted_value,
                    "Check executed"
                );
                CheckOutcome {
                    check_id: check.check_id,
                    plugin_ref: check.plugin_ref.clone(),
                    weight: check.weight,
                    passed: verdict.passed,
                    extracted_value: Some(verdict.extracted_value),
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    check_id = %check.check_id,
                    plugin = %check.plugin_ref,
                    error = %e,
                    "Check failed to run, counting as not passed"
                );
                CheckOutcome {
                    check_id: check.check_id,
                    plugin_ref: check.plugin_ref.clone(),
                    weight: check.weight,
                    passed: false,
                    extracted_value: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Forward a validated result to the reputation sink.
    async fn deliver(
        &self,
        result: ValidationResult,
        timeout: Duration,
    ) -> Result<ValidationResult> {
        let metadata = SinkMetadata::from(&result);
        let delivery = self
            .call_collaborator(
                REPUTATION_SINK,
                timeout,
                self.sink
                    .record(&result.subject_id, result.aggregate_score, &metadata),
            )
            .await;

        match delivery {
            Ok(()) => {
                debug!(
                    attestation_id = %result.attestation_id,
                    "Score delivered to reputation sink"
                );
                Ok(result)
            }
            Err(e) => {
                let reason = match e {
                    EngineError::CollaboratorUnavailable { reason, .. } => reason,
                    other => other.to_string(),
                };
                error!(
                    attestation_id = %result.attestation_id,
                    subject_id = %result.subject_id,
                    reason = %reason,
                    "Reputation sink delivery failed, result must be redelivered out of band"
                );
                if let Some(ref audit) = self.audit {
                    audit
                        .log_sink_failure(&result.attestation_id, &result.subject_id, &reason)
                        .await;
                }
                Err(EngineError::CollaboratorUnavailable {
                    collaborator: REPUTATION_SINK,
                    reason,
                    pending: Some(Box::new(result)),
                })
            }
        }
    }

    async fn call_collaborator<T>(
        &self,
        collaborator: &'static str,
        timeout: Duration,
        call: impl Future<Output = std::result::Result<T, CollaboratorError>>,
    ) -> Result<T> {
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(CollaboratorError::SubjectNotFound(subject_id))) => {
                Err(EngineError::SubjectNotFound(subject_id))
            }
            Ok(Err(CollaboratorError::Unavailable(reason))) => {
                Err(EngineError::CollaboratorUnavailable {
                    collaborator,
                    reason,
                    pending: None,
                })
            }
            Err(_) => Err(EngineError::CollaboratorUnavailable {
                collaborator,
                reason: format!("timed out after {}ms", timeout.as_millis()),
                pending: None,
            }),
        }
    }

    async fn settle(&self, attestation_id: &str, outcome: ProcessedOutcome) {
        if let Err(e) = self.replay.settle(attestation_id, outcome).await {
            // The claim itself is already durable; only the outcome label is lost.
            error!(
                attestation_id = %attestation_id,
                error = %e,
                "Failed to record processed outcome"
            );
        }
    }

    fn loggable(&self, value: &str) -> String {
        if self.sanitize_logs {
            sanitize_for_logging(value)
        } else {
            value.to_string()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{Attestation, FixedClock};
    use crate::checks::LiteralScanExtractor;
    use crate::collaborators::{MemoryReputationSink, StaticOwnershipRegistry};
    use serde_json::json;

    const SOURCE: &str = "https://api.exchange.example/v1/ticker?symbol=BTCUSD";
    const NOW: i64 = 1_700_000_000;

    struct Harness {
        validator: AttestationValidator,
        sink: Arc<MemoryReputationSink>,
        rule_id: RuleId,
    }

    async fn harness() -> Harness {
        let plugins = Arc::new(PluginRegistry::with_defaults(Arc::new(LiteralScanExtractor)));
        let rules = Arc::new(RuleStore::new().with_plugins(plugins.clone()));
        let rule_id = rules.add_rule(SOURCE, "price", 3600, "BTC spot").await.unwrap();

        let owners = Arc::new(StaticOwnershipRegistry::new());
        owners.register("subject_1", "0xAlice");
        let sink = Arc::new(MemoryReputationSink::new());

        let validator = AttestationValidator::new(
            rules,
            Arc::new(ReplayGuard::new()),
            plugins,
            owners,
            sink.clone(),
        )
        .with_clock(Arc::new(FixedClock(NOW)));

        Harness {
            validator,
            sink,
            rule_id,
        }
    }

    fn request(
        id: &str,
        rule_id: RuleId,
        check_ids: Vec<crate::rules::CheckId>,
    ) -> ValidationRequest {
        ValidationRequest {
            attestation: Attestation {
                attestation_id: id.to_string(),
                subject_id: "subject_1".to_string(),
                claimed_source_identifier: SOURCE.to_string(),
                raw_data: r#"{"price":"68164.45"}"#.to_string(),
                observed_at: (NOW - 10) as u64,
            },
            caller: "0xAlice".to_string(),
            rule_id,
            check_ids,
        }
    }

    #[tokio::test]
    async fn test_duplicate_check_ids_run_once() {
        let h = harness().await;
        let check = h
            .validator
            .rules()
            .add_check(&h.rule_id, "range", json!({"min": 0, "max": 1}), 10)
            .await
            .unwrap();

        let result = h
            .validator
            .validate(request("att_dup", h.rule_id, vec![check, check, check]))
            .await
            .unwrap();
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.aggregate_score, 0);
    }

    #[tokio::test]
    async fn test_rejection_settles_claim() {
        let h = harness().await;
        let mut req = request("att_bad_source", h.rule_id, vec![]);
        req.attestation.claimed_source_identifier = "https://evil.example".to_string();

        let err = h.validator.validate(req).await.unwrap_err();
        assert!(matches!(err, EngineError::SourceMismatch { .. }));

        let record = h.validator.replay_guard().record("att_bad_source").unwrap();
        assert_eq!(
            record.outcome,
            ProcessedOutcome::Rejected {
                reason: "source_mismatch".to_string()
            }
        );
        assert!(h.sink.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_plugin_counts_as_failure() {
        struct Panics;

        impl crate::checks::CheckPlugin for Panics {
            fn plugin_ref(&self) -> &'static str {
                "panics"
            }

            fn validate_params(
                &self,
                _: &serde_json::Value,
            ) -> std::result::Result<(), PluginError> {
                Ok(())
            }

            fn validate(
                &self,
                _: &str,
                _: &str,
                _: &serde_json::Value,
            ) -> std::result::Result<crate::checks::CheckVerdict, PluginError> {
                panic!("boom")
            }
        }

        let mut registry = PluginRegistry::with_defaults(Arc::new(LiteralScanExtractor));
        registry.register(Arc::new(Panics));
        let plugins = Arc::new(registry);

        let rules = Arc::new(RuleStore::new().with_plugins(plugins.clone()));
        let rule_id = rules.add_rule(SOURCE, "price", 3600, "").await.unwrap();
        let bad = rules.add_check(&rule_id, "panics", json!({}), 50).await.unwrap();
        let good = rules
            .add_check(&rule_id, "range", json!({"min": 60000, "max": 100000}), 50)
            .await
            .unwrap();

        let owners = Arc::new(StaticOwnershipRegistry::new());
        owners.register("subject_1", "0xAlice");
        let validator = AttestationValidator::new(
            rules,
            Arc::new(ReplayGuard::new()),
            plugins,
            owners,
            Arc::new(MemoryReputationSink::new()),
        )
        .with_clock(Arc::new(FixedClock(NOW)));

        let result = validator
            .validate(request("att_panic", rule_id, vec![bad, good]))
            .await
            .unwrap();
        assert_eq!(result.aggregate_score, 50);
        assert_eq!(
            result.outcomes[0].error,
            Some(PluginError::Panicked("boom".to_string()).to_string())
        );
        assert!(result.outcomes[1].passed);
    }

    #[tokio::test]
    async fn test_accepted_at_follows_clock() {
        let h = harness().await;
        let result = h
            .validator
            .validate(request("att_clock", h.rule_id, vec![]))
            .await
            .unwrap();
        assert_eq!(result.accepted_at.timestamp(), NOW);
        assert_eq!(h.sink.records().await[0].metadata.accepted_at.timestamp(), NOW);
    }

    #[tokio::test]
    async fn test_validation_proceeds_during_pending_catalog_write() {
        use crate::rules::{CatalogStore, Check, CheckId, Rule};
        use async_trait::async_trait;
        use tokio::sync::Notify;

        /// Check inserts stall until released.
        #[derive(Default)]
        struct SlowCheckWrites {
            entered: Notify,
            release: Notify,
        }

        #[async_trait]
        impl CatalogStore for SlowCheckWrites {
            async fn insert_rule(&self, _rule: &Rule) -> std::result::Result<(), String> {
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
                self.entered.notify_one();
                self.release.notified().await;
                Ok(())
            }

            async fn deactivate_check(
                &self,
                _check_id: &CheckId,
            ) -> std::result::Result<(), String> {
                Ok(())
            }
        }

        let writes = Arc::new(SlowCheckWrites::default());
        let plugins = Arc::new(PluginRegistry::with_defaults(Arc::new(LiteralScanExtractor)));
        let rules = Arc::new(
            RuleStore::new()
                .with_plugins(plugins.clone())
                .with_persistence(writes.clone()),
        );
        let rule_id = rules.add_rule(SOURCE, "price", 3600, "").await.unwrap();

        let owners = Arc::new(StaticOwnershipRegistry::new());
        owners.register("subject_1", "0xAlice");
        let validator = AttestationValidator::new(
            rules.clone(),
            Arc::new(ReplayGuard::new()),
            plugins,
            owners,
            Arc::new(MemoryReputationSink::new()),
        )
        .with_clock(Arc::new(FixedClock(NOW)));

        let pending = {
            let rules = rules.clone();
            tokio::spawn(async move {
                rules
                    .add_check(&rule_id, "range", json!({"min": 0, "max": 1}), 10)
                    .await
            })
        };
        writes.entered.notified().await;

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            validator.validate(request("att_during_write", rule_id, vec![])),
        )
        .await
        .expect("validation waited on the catalog write")
        .unwrap();
        assert_eq!(result.rule_id, rule_id);

        writes.release.notify_one();
        pending.await.unwrap().unwrap();
        assert_eq!(rules.checks_for_rule(&rule_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_skipped_ownership_mode() {
        let h = harness().await;
        let validator = h.validator.with_config(ValidationConfig {
            ownership_mode: OwnershipMode::Skipped,
            ..ValidationConfig::default()
        });

        let mut req = request("att_public", h.rule_id, vec![]);
        req.attestation.subject_id = "unregistered".to_string();
        req.caller = "anyone".to_string();

        let result = validator.validate(req).await.unwrap();
        assert_eq!(result.aggregate_score, 0);
    }

    #[tokio::test]
    async fn test_from_config_in_memory() {
        let owners = Arc::new(StaticOwnershipRegistry::new());
        owners.register("subject_1", "0xAlice");

        let mut config = EngineConfig::default();
        config.validation.collaborator_timeout_ms = 250;

        let validator = AttestationValidator::from_config(
            &config,
            owners,
            Arc::new(MemoryReputationSink::new()),
        )
        .await
        .unwrap()
        .with_clock(Arc::new(FixedClock(NOW)));

        assert_eq!(validator.config().collaborator_timeout(), Duration::from_millis(250));
        assert_eq!(validator.plugins().plugin_refs(), vec!["range", "tolerance"]);

        let rule_id = validator.rules().add_rule(SOURCE, "price", 3600, "").await.unwrap();
        let check = validator
            .rules()
            .add_check(&rule_id, "range", json!({"min": 60000, "max": 100000}), 100)
            .await
            .unwrap();

        let result = validator
            .validate(request("att_bootstrap", rule_id, vec![check]))
            .await
            .unwrap();
        assert_eq!(result.aggregate_score, 100);

        let audit = validator.audit().unwrap();
        assert_eq!(audit.get_for_attestation("att_bootstrap").await.len(), 1);
    }
}
