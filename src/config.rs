use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::audit::{AuditSeverity, DEFAULT_MAX_ENTRIES};
use crate::checks::ExtractionStrategy;

/// Configuration for the attestation validation engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Validation pipeline configuration
    pub validation: ValidationConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Audit trail configuration
    pub audit: AuditConfig,
}

/// Whether the ownership step runs.
///
/// Skipping is an explicit mode for subject-less or public attestations,
/// never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipMode {
    #[default]
    Enforced,
    Skipped,
}

impl OwnershipMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "enforced" | "enforce" => Some(Self::Enforced),
            "skipped" | "skip" | "public" => Some(Self::Skipped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Ownership check mode
    pub ownership_mode: OwnershipMode,
    /// Upper bound on each collaborator call (ownership oracle, reputation sink)
    pub collaborator_timeout_ms: u64,
    /// How check plugins extract values from attestation payloads
    pub extraction: ExtractionStrategy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ownership_mode: OwnershipMode::Enforced,
            collaborator_timeout_ms: 5_000,
            extraction: ExtractionStrategy::Literal,
        }
    }
}

impl ValidationConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, everything stays in memory)
    pub postgres_enabled: bool,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/attestation".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask sensitive values (API keys in source URLs) before logging
    pub sanitize_logs: bool,
    /// Emit span open/close events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            sanitize_logs: true,
            log_spans: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Maximum retained audit entries
    pub max_entries: usize,
    /// Entries below this severity are dropped
    pub min_severity: AuditSeverity,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            min_severity: AuditSeverity::Info,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl EngineConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Validation pipeline
        if let Ok(mode) = env::var("CHERT_ATTEST_OWNERSHIP_MODE") {
            config.validation.ownership_mode = OwnershipMode::parse(&mode)
                .with_context(|| format!("Invalid CHERT_ATTEST_OWNERSHIP_MODE value: {}", mode))?;
        }

        if let Ok(timeout) = env::var("CHERT_ATTEST_COLLABORATOR_TIMEOUT_MS") {
            config.validation.collaborator_timeout_ms = timeout
                .parse()
                .context("Invalid CHERT_ATTEST_COLLABORATOR_TIMEOUT_MS value")?;
        }

        if let Ok(extraction) = env::var("CHERT_ATTEST_EXTRACTION") {
            config.validation.extraction = ExtractionStrategy::parse(&extraction)
                .with_context(|| format!("Invalid CHERT_ATTEST_EXTRACTION value: {}", extraction))?;
        }

        // Database configuration
        if let Ok(url) = env::var("CHERT_ATTEST_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Ok(enabled) = env::var("CHERT_ATTEST_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid CHERT_ATTEST_POSTGRES_ENABLED value")?;
        }

        if let Ok(max) = env::var("CHERT_ATTEST_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid CHERT_ATTEST_POSTGRES_MAX_CONNECTIONS value")?;
        }

        // Logging configuration
        if let Ok(log_level) = env::var("CHERT_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(sanitize_logs) = env::var("CHERT_SANITIZE_LOGS") {
            config.logging.sanitize_logs = sanitize_logs
                .parse()
                .context("Invalid CHERT_SANITIZE_LOGS value")?;
        }

        if let Ok(log_spans) = env::var("CHERT_LOG_SPANS") {
            config.logging.log_spans = log_spans
                .parse()
                .context("Invalid CHERT_LOG_SPANS value")?;
        }

        // Audit configuration
        if let Ok(max_entries) = env::var("CHERT_ATTEST_AUDIT_MAX_ENTRIES") {
            config.audit.max_entries = max_entries
                .parse()
                .context("Invalid CHERT_ATTEST_AUDIT_MAX_ENTRIES value")?;
        }

        if let Ok(severity) = env::var("CHERT_ATTEST_AUDIT_MIN_SEVERITY") {
            config.audit.min_severity = AuditSeverity::parse(&severity).with_context(|| {
                format!("Invalid CHERT_ATTEST_AUDIT_MIN_SEVERITY value: {}", severity)
            })?;
        }

        if config.validation.ownership_mode == OwnershipMode::Skipped {
            warn!("Ownership checks are disabled; only use this for public attestations");
        }

        config.validate()?;

        info!(
            ownership_mode = ?config.validation.ownership_mode,
            extraction = ?config.validation.extraction,
            postgres_enabled = config.database.postgres_enabled,
            "Engine configuration loaded"
        );

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.validation.collaborator_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Collaborator timeout must be non-zero"));
        }

        if self.database.postgres_enabled {
            if self.database.postgres_url.is_empty() {
                return Err(anyhow::anyhow!(
                    "PostgreSQL is enabled but no connection string is configured"
                ));
            }
            if self.database.max_connections == 0 {
                return Err(anyhow::anyhow!("PostgreSQL pool size must be non-zero"));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown log level: {} (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.audit.max_entries == 0 {
            return Err(anyhow::anyhow!("Audit capacity must be non-zero"));
        }

        Ok(())
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
        "signature",
    ];

    let data_lower = data.to_lowercase();
    if !sensitive_patterns.iter().any(|p| data_lower.contains(p)) {
        return data.to_string();
    }

    let chars: Vec<char> = data.chars().collect();
    // Longer values keep more context on both ends
    let keep = if chars.len() > 20 { 6 } else { 2.min(chars.len() / 2) };
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("my_authenticator_123"), "my***23");
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
        assert_eq!(
            sanitize_for_logging("https://api.example.com/v1/price?apikey=abcdef123456"),
            "https:***123456"
        );
        assert_eq!(sanitize_for_logging("key"), "k***y");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.validation.ownership_mode, OwnershipMode::Enforced);
        assert_eq!(config.validation.collaborator_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_validation_failures() {
        let mut config = EngineConfig::default();
        config.validation.collaborator_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.database.postgres_enabled = true;
        config.database.postgres_url = String::new();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.audit.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ownership_mode_parse() {
        assert_eq!(OwnershipMode::parse("SKIP"), Some(OwnershipMode::Skipped));
        assert_eq!(OwnershipMode::parse("enforced"), Some(OwnershipMode::Enforced));
        assert_eq!(OwnershipMode::parse("maybe"), None);
    }
}
