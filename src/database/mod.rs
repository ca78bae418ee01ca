//! PostgreSQL Persistence
//!
//! Durable state of the engine: the rule table, the check table and the
//! processed-attestation set. Everything else is derived or in memory.

pub mod pool;
pub mod processed;
pub mod rules;

pub use pool::DatabasePool;
pub use processed::ProcessedRepository;
pub use rules::RuleRepository;
