//! Scheduler-facing handlers: admission, stage gating, step mapping and
//! teardown.
//!
//! Execution ids returned here are opaque to the scheduler; it posts them
//! back to consume a decision or tear an execution down.

use axum::{Json, extract::State, http::StatusCode};
use changegate_core::job::{QueueItem, RunContext};
use changegate_core::{BlockingCause, ExecutionId};
use changegate_engine::{GateDecision, MappingStep, StageDecision, StageInfo, StageRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub execution: ExecutionId,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockingCause>,
}

/// Admission check for a queued item.
pub async fn evaluate_admission(
    State(state): State<Arc<AppState>>,
    Json(item): Json<QueueItem>,
) -> Json<AdmissionResponse> {
    let reason = state.gate.evaluate_admission(&item).await;
    Json(AdmissionResponse {
        execution: item.execution_id(),
        blocked: reason.is_some(),
        reason,
    })
}

#[derive(Debug, Deserialize)]
pub struct StageEvaluation {
    pub run: RunContext,
    pub stage_name: String,
    #[serde(default)]
    pub change_request_details: Option<String>,
    #[serde(default)]
    pub build_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Proceed,
    Wait,
    Abort,
    None,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub decision: DecisionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<StageDecision> for DecisionResponse {
    fn from(decision: StageDecision) -> Self {
        match decision {
            StageDecision::Proceed => Self {
                decision: DecisionKind::Proceed,
                execution: None,
                message: None,
            },
            StageDecision::Wait { execution_id } => Self {
                decision: DecisionKind::Wait,
                execution: Some(execution_id),
                message: None,
            },
            StageDecision::Abort { message } => Self {
                decision: DecisionKind::Abort,
                execution: None,
                message: Some(message),
            },
        }
    }
}

impl From<GateDecision> for DecisionResponse {
    fn from(decision: GateDecision) -> Self {
        let (decision, message) = match decision {
            GateDecision::Proceed => (DecisionKind::Proceed, None),
            GateDecision::Abort { message } => (DecisionKind::Abort, Some(message)),
            GateDecision::NoDecision => (DecisionKind::None, None),
        };
        Self {
            decision,
            execution: None,
            message,
        }
    }
}

/// Gate a pipeline stage.
pub async fn evaluate_stage(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StageEvaluation>,
) -> Json<DecisionResponse> {
    let mut request = StageRequest::new(body.stage_name);
    request.change_request_details = body.change_request_details;
    request.build_url = body.build_url;

    Json(state.gate.evaluate_stage(&body.run, &request).await.into())
}

#[derive(Debug, Deserialize)]
pub struct StageStatusRequest {
    pub run: RunContext,
    pub stage_name: String,
}

/// Current state of a stage; never consumes the decision.
pub async fn stage_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StageStatusRequest>,
) -> Json<DecisionResponse> {
    Json(state.gate.stage_status(&body.run, &body.stage_name).into())
}

#[derive(Debug, Deserialize)]
pub struct StageStarted {
    pub run: RunContext,
    pub stage: StageInfo,
}

/// Stage-status listener notification.
pub async fn stage_started(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StageStarted>,
) -> StatusCode {
    match state
        .gate
        .on_stage_started(&body.run.execution_id(), body.stage)
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            warn!(run = %body.run.run_id, error = %e, "Stage could not be recorded");
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StepMappingBody {
    pub run: RunContext,
    pub stage_name: String,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub ignore_errors: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct StepMappingResponse {
    pub associated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Associate a step with its stage. Mapping failures answer 422.
pub async fn map_step(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StepMappingBody>,
) -> (StatusCode, Json<StepMappingResponse>) {
    let step = MappingStep {
        stage_name: body.stage_name,
        step_id: body.step_id,
        enabled: body.enabled,
        ignore_errors: body.ignore_errors,
    };

    match state.mapper.map_step(&body.run, &step).await {
        Ok(associated) => (
            StatusCode::OK,
            Json(StepMappingResponse {
                associated,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(StepMappingResponse {
                associated: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub execution: ExecutionId,
    #[serde(default)]
    pub ignore_errors: bool,
}

/// Take the stored decision. A second call answers `none`.
pub async fn consume_decision(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConsumeRequest>,
) -> Json<DecisionResponse> {
    let decision = state
        .gate
        .consume_decision(&body.execution, body.ignore_errors);
    debug!(execution = %body.execution, decision = ?decision, "Decision consumed");
    Json(decision.into())
}

#[derive(Debug, Deserialize)]
pub struct TeardownRequest {
    #[serde(default)]
    pub execution: Option<ExecutionId>,
    #[serde(default)]
    pub run: Option<RunContext>,
}

/// Drop everything held for a finished run or execution.
pub async fn teardown(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TeardownRequest>,
) -> StatusCode {
    match (body.run, body.execution) {
        (Some(run), _) => state.gate.teardown_run(&run),
        (None, Some(execution)) => state.gate.teardown(&execution),
        (None, None) => return StatusCode::BAD_REQUEST,
    }
    StatusCode::NO_CONTENT
}
