//! Gate configuration.

use changegate_core::urls::is_valid_url;
use serde::{Deserialize, Serialize};

/// Global change-control settings consulted on every admission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Master switch. When off nothing is governed.
    #[serde(default)]
    pub enabled: bool,
    /// Tool identifier registered with the authority.
    #[serde(default)]
    pub tool_id: String,
    /// Externally reachable base URL; callback URLs are built from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub tracking_url: String,
    #[serde(default)]
    pub change_control_url: String,
    #[serde(default)]
    pub mapping_url: String,
    /// Verbose logging of gate decisions.
    #[serde(default)]
    pub debug: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080/".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tool_id: String::new(),
            base_url: default_base_url(),
            tracking_url: String::new(),
            change_control_url: String::new(),
            mapping_url: String::new(),
            debug: false,
        }
    }
}

impl GateConfig {
    /// Enabled configuration pointing every endpoint under `api_root`.
    pub fn new(tool_id: impl Into<String>, api_root: &str) -> Self {
        let root = api_root.trim_end_matches('/');
        Self {
            enabled: true,
            tool_id: tool_id.into(),
            tracking_url: format!("{}/tracking", root),
            change_control_url: format!("{}/changeControl", root),
            mapping_url: format!("{}/mapping", root),
            ..Default::default()
        }
    }

    /// Enable or disable gating.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the base URL callbacks are served under.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_tool_id(mut self, tool_id: impl Into<String>) -> Self {
        self.tool_id = tool_id.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Tool id present and every endpoint an http(s) URL.
    pub fn is_valid(&self) -> bool {
        !self.tool_id.trim().is_empty()
            && is_valid_url(&self.tracking_url)
            && is_valid_url(&self.change_control_url)
            && is_valid_url(&self.mapping_url)
    }

    /// Enabled but unusable.
    pub fn is_misconfigured(&self) -> bool {
        self.enabled && !self.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disabled() {
        let config = GateConfig::default();
        assert!(!config.enabled);
        assert!(!config.is_valid());
        assert!(!config.is_misconfigured());
    }

    #[test]
    fn test_new_is_valid() {
        let config = GateConfig::new("tool-1", "https://cm.example.com/api/");
        assert!(config.is_valid());
        assert_eq!(config.tracking_url, "https://cm.example.com/api/tracking");
    }

    #[test]
    fn test_missing_tool_id_is_misconfigured() {
        let config = GateConfig::new("", "https://cm.example.com/api");
        assert!(config.is_misconfigured());
    }

    #[test]
    fn test_serde_defaults() {
        let config: GateConfig =
            serde_json::from_str(r#"{"enabled": true, "tool_id": "t"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.base_url, "http://localhost:8080/");
        assert!(config.is_misconfigured());
    }
}
