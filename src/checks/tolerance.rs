//! Tolerance check: passes when the value is within a relative deviation of a target.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checks::{CheckPlugin, CheckVerdict, PluginError, ValueExtractor, parse_params};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceParams {
    pub target: f64,
    /// Allowed deviation as a fraction of `target` (0.05 = 5%)
    #[serde(alias = "max_deviation_ratio")]
    pub max_deviation_ratio: f64,
}

impl ToleranceParams {
    fn validated(params: &serde_json::Value) -> Result<Self, PluginError> {
        let parsed: Self = parse_params(params)?;
        if !parsed.target.is_finite() || !parsed.max_deviation_ratio.is_finite() {
            return Err(PluginError::InvalidParams(
                "tolerance parameters must be finite".to_string(),
            ));
        }
        if parsed.max_deviation_ratio < 0.0 {
            return Err(PluginError::InvalidParams(format!(
                "maxDeviationRatio must be non-negative, got {}",
                parsed.max_deviation_ratio
            )));
        }
        Ok(parsed)
    }

    /// `|value - target| <= target * max_deviation_ratio`
    pub fn accepts(&self, value: f64) -> bool {
        (value - self.target).abs() <= self.target * self.max_deviation_ratio
    }
}

/// Relative tolerance check around a target value.
pub struct ToleranceCheck {
    extractor: Arc<dyn ValueExtractor>,
}

impl ToleranceCheck {
    pub const PLUGIN_REF: &'static str = "tolerance";

    pub fn new(extractor: Arc<dyn ValueExtractor>) -> Self {
        Self { extractor }
    }
}

impl CheckPlugin for ToleranceCheck {
    fn plugin_ref(&self) -> &'static str {
        Self::PLUGIN_REF
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<(), PluginError> {
        ToleranceParams::validated(params).map(|_| ())
    }

    fn validate(
        &self,
        data_key_name: &str,
        raw_data: &str,
        params: &serde_json::Value,
    ) -> Result<CheckVerdict, PluginError> {
        let params = ToleranceParams::validated(params)?;
        let value = self.extractor.extract(data_key_name, raw_data)?;

        Ok(CheckVerdict {
            passed: params.accepts(value),
            extracted_value: value,
        })
    }
}
