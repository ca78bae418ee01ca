//! Range check: passes when `min <= value <= max`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checks::{CheckPlugin, CheckVerdict, PluginError, ValueExtractor, parse_params};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    pub min: f64,
    pub max: f64,
}

impl RangeParams {
    fn validated(params: &serde_json::Value) -> Result<Self, PluginError> {
        let parsed: Self = parse_params(params)?;
        if !parsed.min.is_finite() || !parsed.max.is_finite() {
            return Err(PluginError::InvalidParams("range bounds must be finite".to_string()));
        }
        if parsed.min > parsed.max {
            return Err(PluginError::InvalidParams(format!(
                "min {} exceeds max {}",
                parsed.min, parsed.max
            )));
        }
        Ok(parsed)
    }
}

/// Inclusive range check.
pub struct RangeCheck {
    extractor: Arc<dyn ValueExtractor>,
}

impl RangeCheck {
    pub const PLUGIN_REF: &'static str = "range";

    pub fn new(extractor: Arc<dyn ValueExtractor>) -> Self {
        Self { extractor }
    }
}

impl CheckPlugin for RangeCheck {
    fn plugin_ref(&self) -> &'static str {
        Self::PLUGIN_REF
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<(), PluginError> {
        RangeParams::validated(params).map(|_| ())
    }

    fn validate(
        &self,
        data_key_name: &str,
        raw_data: &str,
        params: &serde_json::Value,
    ) -> Result<CheckVerdict, PluginError> {
        let params = RangeParams::validated(params)?;
        let value = self.extractor.extract(data_key_name, raw_data)?;

        Ok(CheckVerdict {
            passed: params.min <= value && value <= params.max,
            extracted_value: value,
        })
    }
}
