//! Audit Trail
//!
//! Bounded in-memory log of policy changes and validation outcomes. Every
//! entry is mirrored to `tracing` at a level matching its severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::rules::{CheckId, RuleId};

/// Default capacity of the audit log.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AuditEventType {
    // Policy administration
    RuleAdded {
        rule_id: RuleId,
        data_key: String,
    },
    RuleStateChanged {
        rule_id: RuleId,
        active: bool,
    },
    CheckAdded {
        rule_id: RuleId,
        check_id: CheckId,
        plugin_ref: String,
    },
    CheckDeactivated {
        check_id: CheckId,
    },

    // Validation
    AttestationAccepted {
        attestation_id: String,
        subject_id: String,
        rule_id: RuleId,
        score: u8,
    },
    AttestationRejected {
        attestation_id: String,
        subject_id: String,
        reason: String,
    },
    ReplayAttempt {
        attestation_id: String,
        caller: String,
    },
    SinkDeliveryFailed {
        attestation_id: String,
        subject_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Critical = 4,
}

impl AuditSeverity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub metadata: HashMap<String, String>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType, severity: AuditSeverity) -> Self {
        let id = format!("audit_{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));

        Self {
            id,
            timestamp: Utc::now(),
            event_type,
            severity,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    fn subject(&self) -> Option<&str> {
        match &self.event_type {
            AuditEventType::AttestationAccepted { subject_id, .. }
            | AuditEventType::AttestationRejected { subject_id, .. }
            | AuditEventType::SinkDeliveryFailed { subject_id, .. } => Some(subject_id),
            _ => None,
        }
    }

    fn attestation(&self) -> Option<&str> {
        match &self.event_type {
            AuditEventType::AttestationAccepted { attestation_id, .. }
            | AuditEventType::AttestationRejected { attestation_id, .. }
            | AuditEventType::ReplayAttempt { attestation_id, .. }
            | AuditEventType::SinkDeliveryFailed { attestation_id, .. } => Some(attestation_id),
            _ => None,
        }
    }
}

pub struct AuditLogger {
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    max_entries: usize,
    min_severity: AuditSeverity,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: DEFAULT_MAX_ENTRIES,
            min_severity: AuditSeverity::Info,
        }
    }

    pub fn with_min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub async fn log(&self, entry: AuditEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        match entry.severity {
            AuditSeverity::Debug => tracing::debug!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Info => tracing::info!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Warning => tracing::warn!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Error => tracing::error!("AUDIT: {:?}", entry.event_type),
            AuditSeverity::Critical => tracing::error!("AUDIT CRITICAL: {:?}", entry.event_type),
        }

        let mut entries = self.entries.write().await;
        entries.push_back(entry);

        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub async fn log_rule_added(&self, rule_id: &RuleId, data_key: &str) {
        let entry = AuditEntry::new(
            AuditEventType::RuleAdded {
                rule_id: *rule_id,
                data_key: data_key.to_string(),
            },
            AuditSeverity::Info,
        );
        self.log(entry).await;
    }

    pub async fn log_rule_state_changed(&self, rule_id: &RuleId, active: bool) {
        let entry = AuditEntry::new(
            AuditEventType::RuleStateChanged {
                rule_id: *rule_id,
                active,
            },
            AuditSeverity::Info,
        );
        self.log(entry).await;
    }

    pub async fn log_check_added(&self, rule_id: &RuleId, check_id: &CheckId, plugin_ref: &str) {
        let entry = AuditEntry::new(
            AuditEventType::CheckAdded {
                rule_id: *rule_id,
                check_id: *check_id,
                plugin_ref: plugin_ref.to_string(),
            },
            AuditSeverity::Info,
        );
        self.log(entry).await;
    }

    pub async fn log_check_deactivated(&self, check_id: &CheckId) {
        let entry = AuditEntry::new(
            AuditEventType::CheckDeactivated { check_id: *check_id },
            AuditSeverity::Info,
        );
        self.log(entry).await;
    }

    pub async fn log_accepted(
        &self,
        attestation_id: &str,
        subject_id: &str,
        rule_id: &RuleId,
        score: u8,
        checks_run: usize,
    ) {
        let entry = AuditEntry::new(
            AuditEventType::AttestationAccepted {
                attestation_id: attestation_id.to_string(),
                subject_id: subject_id.to_string(),
                rule_id: *rule_id,
                score,
            },
            AuditSeverity::Info,
        )
        .with_metadata("checks_run", &checks_run.to_string());
        self.log(entry).await;
    }

    pub async fn log_rejected(&self, attestation_id: &str, subject_id: &str, reason: &str) {
        let entry = AuditEntry::new(
            AuditEventType::AttestationRejected {
                attestation_id: attestation_id.to_string(),
                subject_id: subject_id.to_string(),
                reason: reason.to_string(),
            },
            AuditSeverity::Warning,
        );
        self.log(entry).await;
    }

    pub async fn log_replay_attempt(&self, attestation_id: &str, caller: &str) {
        let entry = AuditEntry::new(
            AuditEventType::ReplayAttempt {
                attestation_id: attestation_id.to_string(),
                caller: caller.to_string(),
            },
            AuditSeverity::Warning,
        );
        self.log(entry).await;
    }

    pub async fn log_sink_failure(&self, attestation_id: &str, subject_id: &str, reason: &str) {
        let entry = AuditEntry::new(
            AuditEventType::SinkDeliveryFailed {
                attestation_id: attestation_id.to_string(),
                subject_id: subject_id.to_string(),
                reason: reason.to_string(),
            },
            AuditSeverity::Error,
        );
        self.log(entry).await;
    }

    pub async fn get_recent(&self, count: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(count).cloned().collect()
    }

    pub async fn get_by_severity(&self, min_severity: AuditSeverity) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.severity >= min_severity)
            .cloned()
            .collect()
    }

    /// Validation history of one subject, oldest first.
    pub async fn get_for_subject(&self, subject_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.subject() == Some(subject_id))
            .cloned()
            .collect()
    }

    pub async fn get_for_attestation(&self, attestation_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.attestation() == Some(attestation_id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
