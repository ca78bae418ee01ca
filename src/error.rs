//! Error types for attestation validation and policy administration.

use thiserror::Error;

use crate::attestation::ValidationResult;

/// Errors returned by the engine.
///
/// Everything after [`EngineError::DuplicateAttestation`] in the validation
/// pipeline is raised with the replay claim already consumed.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed administrative parameters. No state was mutated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced rule does not exist.
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// The referenced check does not exist.
    #[error("Check not found: {0}")]
    CheckNotFound(String),

    /// The rule exists but is deactivated.
    #[error("Rule inactive: {0}")]
    RuleInactive(String),

    /// The claimed source does not hash to the rule's commitment.
    #[error("Source mismatch for rule {rule_id}")]
    SourceMismatch {
        /// Rule the attestation was checked against.
        rule_id: String,
    },

    /// The attestation is older than the freshness window, or in the future.
    #[error("Attestation expired: age {age_secs}s, window {window_secs}s")]
    AttestationExpired {
        /// Observed age in seconds (negative when the timestamp is ahead of now).
        age_secs: i64,
        /// Freshness window of the rule.
        window_secs: u64,
    },

    /// The caller is not the registered owner of the subject.
    #[error("Ownership mismatch: caller {caller} does not own subject {subject_id}")]
    OwnershipMismatch {
        /// Subject of the attestation.
        subject_id: String,
        /// Identity that submitted it.
        caller: String,
    },

    /// The ownership oracle has no record of the subject.
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    /// The attestation id has already been claimed.
    #[error("Duplicate attestation: {0}")]
    DuplicateAttestation(String),

    /// A collaborator failed or timed out.
    ///
    /// When the failure happened while delivering to the reputation sink, the
    /// already-built result is attached so it can be redelivered out of band.
    #[error("Collaborator unavailable ({collaborator}): {reason}")]
    CollaboratorUnavailable {
        /// Which collaborator failed.
        collaborator: &'static str,
        /// Failure description.
        reason: String,
        /// Result awaiting delivery, if validation had completed.
        pending: Option<Box<ValidationResult>>,
    },

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Terminal rejections: the attestation will never validate.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineError::RuleNotFound(_)
                | EngineError::RuleInactive(_)
                | EngineError::SourceMismatch { .. }
                | EngineError::AttestationExpired { .. }
                | EngineError::OwnershipMismatch { .. }
                | EngineError::SubjectNotFound(_)
                | EngineError::DuplicateAttestation(_)
        )
    }

    /// Failures the caller may resolve by retrying out of band.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::CollaboratorUnavailable { .. } | EngineError::Storage(_)
        )
    }

    /// Short machine-readable reason, used in audit entries and processed records.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::RuleNotFound(_) => "rule_not_found",
            EngineError::CheckNotFound(_) => "check_not_found",
            EngineError::RuleInactive(_) => "rule_inactive",
            EngineError::SourceMismatch { .. } => "source_mismatch",
            EngineError::AttestationExpired { .. } => "attestation_expired",
            EngineError::OwnershipMismatch { .. } => "ownership_mismatch",
            EngineError::SubjectNotFound(_) => "subject_not_found",
            EngineError::DuplicateAttestation(_) => "duplicate_attestation",
            EngineError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            EngineError::Storage(_) => "storage",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
