//! Inbound decisions from the change-management authority.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use changegate_core::{CallbackOutcome, CallbackToken};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub execution: String,
    pub outcome: &'static str,
    pub received_at: DateTime<Utc>,
}

fn outcome_label(outcome: &CallbackOutcome) -> &'static str {
    match outcome {
        CallbackOutcome::Approved => "approved",
        CallbackOutcome::Canceled => "canceled",
        CallbackOutcome::CommFailure => "comm_failure",
        CallbackOutcome::Aborted => "aborted",
        CallbackOutcome::Failed(_) => "failed",
        CallbackOutcome::Unrecognized => "unrecognized",
    }
}

/// Resolve the execution waiting on `token` with the raw request body.
///
/// Unknown and already-resolved tokens answer 404.
pub async fn receive_callback(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<CallbackResponse>), StatusCode> {
    let token = CallbackToken::from(token);
    if token.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let Some((execution_id, outcome)) = state.gate.resolve_callback_token(&token, &body).await
    else {
        warn!(token = %token, "Callback for unknown or consumed token");
        return Err(StatusCode::NOT_FOUND);
    };

    info!(token = %token, execution = %execution_id, outcome = ?outcome, "Callback accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(CallbackResponse {
            execution: execution_id.to_string(),
            outcome: outcome_label(&outcome),
            received_at: Utc::now(),
        }),
    ))
}
