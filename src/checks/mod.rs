//! Check Plugins
//!
//! Pluggable, stateless validation strategies. Each check attached to a rule
//! names a plugin by reference; the [`PluginRegistry`] resolves the reference
//! at call time.
//!
//! ```text
//! Check { plugin_ref: "range", params: {"min": .., "max": ..} }
//!                │
//!                ▼
//! PluginRegistry ──► RangeCheck ──► ValueExtractor ──► raw_data
//!                                        │
//!                                        ▼
//!                              CheckVerdict { passed, extracted_value }
//! ```
//!
//! Plugins must be pure functions of `(data_key_name, raw_data, params)`:
//! no I/O, no wall clock, no shared mutable state.

pub mod extract;
mod range;
mod tolerance;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use extract::{
    ExtractionStrategy, LiteralScanExtractor, StructuredJsonExtractor, ValueExtractor,
};
pub use range::{RangeCheck, RangeParams};
pub use tolerance::{ToleranceCheck, ToleranceParams};

/// Errors raised by a plugin. The validator downgrades all of them to a
/// failed check; none aborts a validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Data key not present: {0}")]
    MissingKey(String),

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Invalid plugin parameters: {0}")]
    InvalidParams(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Plugin panicked: {0}")]
    Panicked(String),
}

/// Result of one plugin invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckVerdict {
    pub passed: bool,
    pub extracted_value: f64,
}

/// A validation strategy.
pub trait CheckPlugin: Send + Sync {
    /// Registry key, e.g. `"range"`.
    fn plugin_ref(&self) -> &'static str;

    /// Validate parameters when a check is authored.
    fn validate_params(&self, params: &serde_json::Value) -> Result<(), PluginError>;

    fn validate(
        &self,
        data_key_name: &str,
        raw_data: &str,
        params: &serde_json::Value,
    ) -> Result<CheckVerdict, PluginError>;
}

/// Maps plugin references to implementations.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn CheckPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `range` and `tolerance` plugins, both
    /// sharing the given extractor.
    pub fn with_defaults(extractor: Arc<dyn ValueExtractor>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RangeCheck::new(extractor.clone())));
        registry.register(Arc::new(ToleranceCheck::new(extractor)));
        registry
    }

    /// Register a plugin, replacing any previous one under the same reference.
    pub fn register(&mut self, plugin: Arc<dyn CheckPlugin>) {
        debug!(plugin_ref = plugin.plugin_ref(), "Registered check plugin");
        self.plugins.insert(plugin.plugin_ref().to_string(), plugin);
    }

    pub fn get(&self, plugin_ref: &str) -> Option<Arc<dyn CheckPlugin>> {
        self.plugins.get(plugin_ref).cloned()
    }

    pub fn contains(&self, plugin_ref: &str) -> bool {
        self.plugins.contains_key(plugin_ref)
    }

    pub fn plugin_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.plugins.keys().cloned().collect();
        refs.sort();
        refs
    }

    /// Check that `plugin_ref` exists and accepts `params`.
    pub fn validate_params(
        &self,
        plugin_ref: &str,
        params: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.get(plugin_ref)
            .ok_or_else(|| PluginError::UnknownPlugin(plugin_ref.to_string()))?
            .validate_params(params)
    }

    /// Resolve and invoke a plugin.
    pub fn run(
        &self,
        plugin_ref: &str,
        data_key_name: &str,
        raw_data: &str,
        params: &serde_json::Value,
    ) -> Result<CheckVerdict, PluginError> {
        let plugin = self
            .get(plugin_ref)
            .ok_or_else(|| PluginError::UnknownPlugin(plugin_ref.to_string()))?;
        plugin.validate(data_key_name, raw_data, params)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugin_refs())
            .finish()
    }
}

pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(
    params: &serde_json::Value,
) -> Result<T, PluginError> {
    serde_json::from_value(params.clone()).map_err(|e| PluginError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> PluginRegistry {
        PluginRegistry::with_defaults(Arc::new(LiteralScanExtractor))
    }

    #[test]
    fn test_default_plugins_registered() {
        let registry = registry();
        assert_eq!(registry.plugin_refs(), vec!["range", "tolerance"]);
        assert!(registry.contains("range"));
        assert!(!registry.contains("regex"));
    }

    #[test]
    fn test_run_dispatches_by_reference() {
        let registry = registry();
        let verdict = registry
            .run("range", "price", r#"{"price":"50"}"#, &json!({"min": 0, "max": 100}))
            .unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.extracted_value, 50.0);
    }

    #[test]
    fn test_unknown_plugin() {
        let err = registry()
            .run("regex", "price", "{}", &json!({}))
            .unwrap_err();
        assert_eq!(err, PluginError::UnknownPlugin("regex".to_string()));
    }

    struct AlwaysPass;

    impl CheckPlugin for AlwaysPass {
        fn plugin_ref(&self) -> &'static str {
            "always_pass"
        }

        fn validate_params(&self, _params: &serde_json::Value) -> Result<(), PluginError> {
            Ok(())
        }

        fn validate(
            &self,
            _: &str,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<CheckVerdict, PluginError> {
            Ok(CheckVerdict {
                passed: true,
                extracted_value: 0.0,
            })
        }
    }

    #[test]
    fn test_custom_plugin_registration() {
        let mut registry = registry();
        registry.register(Arc::new(AlwaysPass));
        assert!(registry.validate_params("always_pass", &json!(null)).is_ok());
        assert!(registry.run("always_pass", "x", "", &json!(null)).unwrap().passed);
    }
}
