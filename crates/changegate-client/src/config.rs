//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoints, credentials and timeouts for the change-management authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub tool_id: String,
    /// Sent as `toolType` with every request.
    #[serde(default = "default_tool_type")]
    pub tool_type: String,
    pub tracking_url: String,
    pub change_control_url: String,
    pub mapping_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Connection timeout.
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
}

fn default_tool_type() -> String {
    "jenkins".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tool_id: String::new(),
            tool_type: default_tool_type(),
            tracking_url: String::new(),
            change_control_url: String::new(),
            mapping_url: String::new(),
            username: None,
            password: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    /// Config with every endpoint under `api_root`.
    pub fn new(tool_id: impl Into<String>, api_root: &str) -> Self {
        let root = api_root.trim_end_matches('/');
        Self {
            tool_id: tool_id.into(),
            tracking_url: format!("{}/tracking", root),
            change_control_url: format!("{}/changeControl", root),
            mapping_url: format!("{}/mapping", root),
            ..Default::default()
        }
    }

    /// Basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("tool", "https://cm.example.com/api/");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.change_control_url, "https://cm.example.com/api/changeControl");
        assert!(config.username.is_none());
    }

    #[test]
    fn test_timeouts_in_seconds() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "tool_id": "t",
                "tracking_url": "https://a/t",
                "change_control_url": "https://a/c",
                "mapping_url": "https://a/m",
                "connect_timeout": 2
            }"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.tool_type, "jenkins");
    }
}
