//! Callback payloads delivered by the change-management authority.
//!
//! The payload body is opaque to the gate except for a handful of
//! attributes: `result` carries the decision (`approved`, `canceled`,
//! `comm_failure`), `canceled` marks a payload synthesized by the gate
//! after a failed registration, and `failure` carries an error message
//! from the authority.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

pub const RESULT_ATTR: &str = "result";
pub const RESULT_APPROVED: &str = "approved";
pub const RESULT_CANCELED: &str = "canceled";
pub const RESULT_COMM_FAILURE: &str = "comm_failure";
pub const CANCELED_ATTR: &str = "canceled";
pub const FAILURE_ATTR: &str = "failure";

/// Raw callback content stored per execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackPayload(String);

impl CallbackPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Synthesized when resolving a callback could not be completed.
    pub fn comm_failure() -> Self {
        Self(json!({ RESULT_ATTR: RESULT_COMM_FAILURE }).to_string())
    }

    /// Synthesized when a registration attempt failed.
    pub fn abort() -> Self {
        Self(json!({ CANCELED_ATTR: "true" }).to_string())
    }

    /// Failure reported by the authority, with its message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self(json!({ FAILURE_ATTR: message.into() }).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn outcome(&self) -> CallbackOutcome {
        CallbackOutcome::classify(&self.0)
    }

    /// Whether the raw body parses as a JSON object.
    pub fn is_well_formed(&self) -> bool {
        parse_object(&self.0).is_some()
    }
}

impl fmt::Display for CallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a callback payload means for the waiting execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Approved,
    /// The change request was canceled; the queued item must be removed.
    Canceled,
    CommFailure,
    /// The gate aborted the registration itself.
    Aborted,
    /// The authority reported a failure.
    Failed(String),
    Unrecognized,
}

impl CallbackOutcome {
    pub fn classify(raw: &str) -> Self {
        let Some(obj) = parse_object(raw) else {
            return CallbackOutcome::Unrecognized;
        };

        if let Some(result) = obj.get(RESULT_ATTR) {
            return match value_as_str(result).as_deref() {
                Some(RESULT_APPROVED) => CallbackOutcome::Approved,
                Some(RESULT_CANCELED) => CallbackOutcome::Canceled,
                Some(RESULT_COMM_FAILURE) => CallbackOutcome::CommFailure,
                _ => CallbackOutcome::Unrecognized,
            };
        }

        if obj
            .get(CANCELED_ATTR)
            .and_then(value_as_str)
            .is_some_and(|v| v == "true")
        {
            return CallbackOutcome::Aborted;
        }

        match obj.get(FAILURE_ATTR) {
            Some(failure) => CallbackOutcome::Failed(
                value_as_str(failure).unwrap_or_else(|| failure.to_string()),
            ),
            None => CallbackOutcome::Unrecognized,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, CallbackOutcome::Approved)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CallbackOutcome::Canceled)
    }
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn value_as_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Human-readable reason returned to the scheduler while an item is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockingCause(String);

impl BlockingCause {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn waiting_for_approval() -> Self {
        Self::new("Job is waiting for approval")
    }

    pub fn short_description(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockingCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_decisions() {
        assert_eq!(
            CallbackOutcome::classify(r#"{"result":"approved","comment":"ok"}"#),
            CallbackOutcome::Approved
        );
        assert_eq!(
            CallbackOutcome::classify(r#"{"result":"canceled"}"#),
            CallbackOutcome::Canceled
        );
        assert_eq!(
            CallbackOutcome::classify(r#"{"result":"rejected"}"#),
            CallbackOutcome::Unrecognized
        );
    }

    #[test]
    fn test_synthesized_payloads() {
        assert_eq!(
            CallbackPayload::comm_failure().outcome(),
            CallbackOutcome::CommFailure
        );
        assert_eq!(CallbackPayload::abort().outcome(), CallbackOutcome::Aborted);
        assert_eq!(
            CallbackPayload::failure("bad details").outcome(),
            CallbackOutcome::Failed("bad details".into())
        );
    }

    #[test]
    fn test_malformed_payload() {
        let payload = CallbackPayload::new("not json");
        assert!(!payload.is_well_formed());
        assert_eq!(payload.outcome(), CallbackOutcome::Unrecognized);
        assert!(!CallbackPayload::new("[1,2]").is_well_formed());
    }
}
