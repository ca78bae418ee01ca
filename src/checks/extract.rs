//! Value extraction strategies
//!
//! A check plugin needs one numeric value out of the attestation's raw
//! payload. Two strategies exist:
//!
//! - [`LiteralScanExtractor`]: first `"<key>":` substring, then a quoted or
//!   bare number. Can match inside unrelated fields or nested objects.
//! - [`StructuredJsonExtractor`]: parses the payload as JSON and walks a
//!   dotted key path. Rejects payloads that are not valid JSON.
//!
//! Literal scanning is the default because existing producers and consumers
//! depend on its tolerance (trailing garbage, non-JSON envelopes).

use serde::{Deserialize, Serialize};

use crate::checks::PluginError;

/// Extracts a numeric value for a data key from a raw payload.
pub trait ValueExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, data_key_name: &str, raw_data: &str) -> Result<f64, PluginError>;
}

/// Configured extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    #[default]
    Literal,
    Structured,
}

impl ExtractionStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "literal" | "literal_scan" => Some(Self::Literal),
            "structured" | "json" => Some(Self::Structured),
            _ => None,
        }
    }

    pub fn build(self) -> std::sync::Arc<dyn ValueExtractor> {
        match self {
            Self::Literal => std::sync::Arc::new(LiteralScanExtractor),
            Self::Structured => std::sync::Arc::new(StructuredJsonExtractor),
        }
    }
}

/// Scans for the literal `"<key>":` and parses the literal that follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralScanExtractor;

impl ValueExtractor for LiteralScanExtractor {
    fn name(&self) -> &'static str {
        "literal_scan"
    }

    fn extract(&self, data_key_name: &str, raw_data: &str) -> Result<f64, PluginError> {
        let needle = format!("\"{}\":", data_key_name);
        let start = raw_data
            .find(&needle)
            .ok_or_else(|| PluginError::MissingKey(data_key_name.to_string()))?;

        let rest = raw_data[start + needle.len()..].trim_start();

        let literal = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or_else(|| {
                PluginError::MalformedValue(format!("unterminated string for {}", data_key_name))
            })?;
            quoted[..end].trim()
        } else {
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
                .unwrap_or(rest.len());
            &rest[..end]
        };

        parse_number(data_key_name, literal)
    }
}

/// Parses the payload as JSON and resolves a dotted key path (`"data.price"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredJsonExtractor;

impl ValueExtractor for StructuredJsonExtractor {
    fn name(&self) -> &'static str {
        "structured_json"
    }

    fn extract(&self, data_key_name: &str, raw_data: &str) -> Result<f64, PluginError> {
        let root: serde_json::Value = serde_json::from_str(raw_data)
            .map_err(|e| PluginError::MalformedValue(format!("payload is not JSON: {}", e)))?;

        let mut current = &root;
        for segment in data_key_name.split('.') {
            current = current
                .get(segment)
                .ok_or_else(|| PluginError::MissingKey(data_key_name.to_string()))?;
        }

        match current {
            serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| {
                PluginError::MalformedValue(format!("{} is out of range", data_key_name))
            }),
            serde_json::Value::String(s) => parse_number(data_key_name, s.trim()),
            other => Err(PluginError::MalformedValue(format!(
                "{} is not numeric: {}",
                data_key_name, other
            ))),
        }
    }
}

fn parse_number(data_key_name: &str, literal: &str) -> Result<f64, PluginError> {
    let value: f64 = literal.parse().map_err(|_| {
        PluginError::MalformedValue(format!(
            "{} has non-numeric value {:?}",
            data_key_name, literal
        ))
    })?;

    if !value.is_finite() {
        return Err(PluginError::MalformedValue(format!(
            "{} is not finite",
            data_key_name
        )));
    }

    Ok(value)
}
