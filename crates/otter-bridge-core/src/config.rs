//! Isolate configuration.

use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// Per-isolate settings.
///
/// Can be built in code or loaded from TOML:
///
/// ```
/// use otter_bridge_core::IsolateConfig;
///
/// let config = IsolateConfig::from_toml_str(
///     r#"
///     name = "worker-1"
///     trace_boundary_calls = true
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.name.as_deref(), Some("worker-1"));
/// assert_eq!(config.first_function_template_id, 1);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsolateConfig {
    /// Name attached to log events of this isolate.
    pub name: Option<String>,

    /// First id handed out by the callback registry.
    /// Default: 1 (0 is never a valid id)
    pub first_function_template_id: u32,

    /// Emit a `trace` event for every boundary call.
    /// Default: false
    pub trace_boundary_calls: bool,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            name: None,
            first_function_template_id: 1,
            trace_boundary_calls: false,
        }
    }
}

impl IsolateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> BridgeResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document, e.g. an embedder's settings blob.
    pub fn from_json_str(source: &str) -> BridgeResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn first_function_template_id(mut self, id: u32) -> Self {
        self.first_function_template_id = id;
        self
    }

    pub fn trace_boundary_calls(mut self, enabled: bool) -> Self {
        self.trace_boundary_calls = enabled;
        self
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.first_function_template_id == 0 {
            return Err(BridgeError::InvalidConfig(
                "first_function_template_id must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IsolateConfig::default();
        assert!(config.name.is_none());
        assert_eq!(config.first_function_template_id, 1);
        assert!(!config.trace_boundary_calls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = IsolateConfig::new()
            .name("main")
            .first_function_template_id(100)
            .trace_boundary_calls(true);
        assert_eq!(config.name.as_deref(), Some("main"));
        assert_eq!(config.first_function_template_id, 100);
        assert!(config.trace_boundary_calls);
    }

    #[test]
    fn test_from_json() {
        let config =
            IsolateConfig::from_json_str(r#"{"name": "embedded", "first_function_template_id": 7}"#)
                .unwrap();
        assert_eq!(config.name.as_deref(), Some("embedded"));
        assert_eq!(config.first_function_template_id, 7);

        let err = IsolateConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, BridgeError::Json(_)));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = IsolateConfig::from_toml_str("first_function_template_id = 42").unwrap();
        assert_eq!(config.first_function_template_id, 42);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_from_toml_rejects_zero_id() {
        let err = IsolateConfig::from_toml_str("first_function_template_id = 0").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_toml_unknown_field() {
        let err = IsolateConfig::from_toml_str("pool_size = 4").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
