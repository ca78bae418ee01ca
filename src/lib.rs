//! Chert Attestation Engine
//!
//! Validates externally produced, proof-carrying attestations against a
//! configurable policy and turns each one into a bounded 0-100 trust score,
//! exactly once per attestation.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs          - Crate root with re-exports
//! ├── config.rs       - Configuration management
//! ├── error.rs        - Engine error taxonomy
//! ├── telemetry.rs    - Logging setup
//! ├── attestation/    - Input and result models
//! │   ├── source.rs   - Source identifier commitments (SHA-256)
//! │   └── time.rs     - Timestamp normalization, freshness, clocks
//! ├── checks/         - Pluggable check strategies
//! │   ├── extract.rs  - Value extraction (literal scan, structured JSON)
//! │   ├── range.rs    - min <= v <= max
//! │   └── tolerance.rs - |v - target| <= target * ratio
//! ├── rules/          - Rule & check catalog
//! │   ├── models.rs   - Rule, Check, identifiers
//! │   └── store.rs    - Snapshot catalog and administrative API
//! ├── replay.rs       - Exactly-once claims
//! ├── scoring.rs      - Weighted score aggregation
//! ├── collaborators.rs - Ownership oracle & reputation sink interfaces
//! ├── audit.rs        - Audit trail
//! ├── validator.rs    - Validation pipeline orchestrator
//! └── database/       - PostgreSQL persistence
//! ```

pub mod attestation;
pub mod audit;
pub mod checks;
pub mod collaborators;
pub mod config;
pub mod database;
pub mod error;
pub mod replay;
pub mod rules;
pub mod scoring;
pub mod telemetry;
pub mod validator;

// Re-export main types for convenience
pub use attestation::{
    Attestation, CheckOutcome, Clock, FixedClock, SourceHash, SystemClock, ValidationRequest,
    ValidationResult, hash_source_identifier,
};
pub use audit::{AuditEntry, AuditEventType, AuditLogger, AuditSeverity};
pub use checks::{
    CheckPlugin, CheckVerdict, ExtractionStrategy, LiteralScanExtractor, PluginError,
    PluginRegistry, RangeCheck, StructuredJsonExtractor, ToleranceCheck, ValueExtractor,
};
pub use collaborators::{
    CollaboratorError, MemoryReputationSink, OwnershipOracle, RecordedScore, ReputationSink,
    SinkMetadata, StaticOwnershipRegistry,
};
pub use config::{EngineConfig, OwnershipMode, ValidationConfig};
pub use database::pool::DatabasePool;
pub use error::{EngineError, Result};
pub use replay::{ClaimStore, ProcessedOutcome, ProcessedRecord, ReplayGuard};
pub use rules::{CatalogStore, Check, CheckId, Rule, RuleCatalog, RuleId, RuleStore};
pub use scoring::{MAX_SCORE, ScoreAggregator};
pub use validator::AttestationValidator;
