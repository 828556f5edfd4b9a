//! Response envelope parsing and failure classification.
//!
//! Successful answers arrive as `{"result": {"<attr>": ...}}`. Failures
//! arrive as `{"failure": "<message>"}`, either at the top level or inside
//! `result`.

use changegate_core::wire::{FailureKind, RemoteFailure, RemoteResult};
use serde_json::Value;

pub const RESULT_ATTR: &str = "result";
pub const FAILURE_ATTR: &str = "failure";
pub const TRACKING_ATTR: &str = "tracking";
pub const TEST_INFO_ATTR: &str = "testInfo";
pub const CHANGE_CONTROL_ATTR: &str = "changeControl";
pub const STEP_MAPPING_ATTR: &str = "status";

/// Map a failure message onto a [`FailureKind`].
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else if lower.contains("unauthorized")
        || lower.contains("not authenticated")
        || lower.contains("401")
    {
        FailureKind::Unauthorized
    } else if lower.contains("details not found") {
        FailureKind::DetailsNotFound
    } else if lower.contains("timed out") || lower.contains("timeout") {
        FailureKind::Timeout
    } else {
        FailureKind::Other
    }
}

fn failure_from(value: &Value) -> RemoteFailure {
    let message = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    RemoteFailure::new(classify_failure(&message), message)
}

/// The `result` object, or the failure the body reports.
pub fn result_object(body: &Value) -> RemoteResult<&serde_json::Map<String, Value>> {
    if let Some(failure) = body.get(FAILURE_ATTR) {
        return Err(failure_from(failure));
    }
    match body.get(RESULT_ATTR) {
        Some(Value::Object(result)) => {
            if let Some(failure) = result.get(FAILURE_ATTR) {
                return Err(failure_from(failure));
            }
            Ok(result)
        }
        _ => Err(RemoteFailure::new(
            FailureKind::Malformed,
            format!("missing '{}' object in response", RESULT_ATTR),
        )),
    }
}

/// String value of `result.<attr>`. Booleans are rendered as `true`/`false`.
pub fn result_attr(body: &Value, attr: &str) -> RemoteResult<String> {
    match result_object(body)?.get(attr) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(RemoteFailure::new(
            FailureKind::Malformed,
            format!("missing '{}' in response result", attr),
        )),
    }
}
