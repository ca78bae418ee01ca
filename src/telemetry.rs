//! Logging setup for binaries embedding the engine.

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::LoggingConfig;

/// Map a configured level name to a tracing level. Unknown names fall back to INFO.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Install the global `tracing` subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_span_events(if config.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.sanitize_logs {
        info!("Logging initialized with data sanitization enabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // The first call may already fail if another test installed a subscriber.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
