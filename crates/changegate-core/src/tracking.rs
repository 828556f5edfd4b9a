//! Tracking decisions: is an execution governed by change control?

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed, UI-facing reasons for an unreachable authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidConfiguration,
    ConnectionRefused,
    Unauthorized,
    Generic,
}

impl FailureReason {
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::InvalidConfiguration => {
                "Change control configuration is invalid. Check the tool id and endpoint URLs."
            }
            FailureReason::ConnectionRefused => {
                "Connection to the change management service was refused."
            }
            FailureReason::Unauthorized => {
                "Change management service rejected the configured credentials."
            }
            FailureReason::Generic => "Change management service could not be reached.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a tracking query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingDecision {
    pub tracked: bool,
    #[serde(default)]
    pub unreachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_info: Option<serde_json::Value>,
}

impl TrackingDecision {
    pub fn tracked() -> Self {
        Self {
            tracked: true,
            ..Default::default()
        }
    }

    pub fn tracked_with(test_info: Option<serde_json::Value>) -> Self {
        Self {
            tracked: true,
            test_info,
            ..Default::default()
        }
    }

    pub fn untracked() -> Self {
        Self::default()
    }

    pub fn unreachable(reason: FailureReason) -> Self {
        Self {
            tracked: false,
            unreachable: true,
            error_message: Some(reason.message().to_string()),
            test_info: None,
        }
    }
}

impl fmt::Display for TrackingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tracked: {}, unreachable: {}",
            self.tracked, self.unreachable
        )
    }
}
