//! Gating state machine.
//!
//! The scheduler polls [`ChangeGate::evaluate_admission`] for queued
//! free-form jobs and pipeline steps call [`ChangeGate::evaluate_stage`].
//! Both are safe to call repeatedly: once a token is registered, further
//! polls answer from the registry without contacting the authority, and
//! once a callback has landed the stored decision is final.

use crate::config::GateConfig;
use crate::details;
use crate::graph::{GraphStore, PipelineGraph, StageInfo};
use crate::registry::WebhookRegistry;
use crate::tracking::TrackingResolver;
use changegate_core::job::{QueueItem, RunContext};
use changegate_core::ports::{ChangeControlAuthority, JobQueue};
use changegate_core::urls::callback_url;
use changegate_core::wire::{ControlVerdict, JobDetails, JobTarget, RegistrationRequest, StageScope};
use changegate_core::{
    BlockingCause, CallbackOutcome, CallbackPayload, CallbackToken, ExecutionId, Result,
    TokenKind,
};
use dashmap::DashSet;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CHANGE_REQUEST_DETAILS_PARSE_ERROR: &str = "Failed to parse changeRequestDetails json.";
const CANCELED_MESSAGE: &str = "Change request was canceled";
const COMM_FAILURE_MESSAGE: &str = "Communication failure while resolving the change request";
const REGISTRATION_ABORTED_MESSAGE: &str = "Change control registration failed";
const UNKNOWN_STAGE_MESSAGE: &str = "Could not find a change control step for this job";

/// Outcome of a stage-scoped gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageDecision {
    /// Not governed, or approved.
    Proceed,
    /// Suspended until the callback for `execution_id` arrives.
    Wait { execution_id: ExecutionId },
    Abort { message: String },
}

/// A consumed callback decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Abort { message: String },
    /// Nothing stored, or already consumed.
    NoDecision,
}

/// Per-stage input to [`ChangeGate::evaluate_stage`].
#[derive(Debug, Clone, Default)]
pub struct StageRequest {
    pub stage_name: String,
    /// Overrides the job's change request details when set.
    pub change_request_details: Option<String>,
    /// Absolute URL of the stage's build.
    pub build_url: Option<String>,
}

impl StageRequest {
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            ..Default::default()
        }
    }

    pub fn with_change_request_details(mut self, details: impl Into<String>) -> Self {
        self.change_request_details = Some(details.into());
        self
    }

    pub fn with_build_url(mut self, url: impl Into<String>) -> Self {
        self.build_url = Some(url.into());
        self
    }
}

/// Releases an in-flight claim on drop.
struct Claim<'a> {
    set: &'a DashSet<ExecutionId>,
    execution_id: ExecutionId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.execution_id);
    }
}

/// How a registration attempt ended.
enum Registration {
    /// Token bound and accepted; waiting for the callback.
    Waiting,
    /// Nothing landed; store this payload as the terminal decision.
    Failed(CallbackPayload),
    /// A callback resolved the token while the call was in flight.
    Resolved(CallbackPayload),
}

/// Admission and stage gating against the change-management authority.
pub struct ChangeGate {
    config: Arc<GateConfig>,
    authority: Arc<dyn ChangeControlAuthority>,
    queue: Arc<dyn JobQueue>,
    resolver: Arc<TrackingResolver>,
    registry: Arc<WebhookRegistry>,
    graphs: Arc<GraphStore>,
    in_flight: DashSet<ExecutionId>,
}

impl ChangeGate {
    pub fn new(
        config: GateConfig,
        authority: Arc<dyn ChangeControlAuthority>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let config = Arc::new(config);
        let resolver = Arc::new(TrackingResolver::new(authority.clone(), config.clone()));
        Self {
            config,
            authority,
            queue,
            resolver,
            registry: Arc::new(WebhookRegistry::new()),
            graphs: Arc::new(GraphStore::new()),
            in_flight: DashSet::new(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<TrackingResolver> {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<WebhookRegistry> {
        &self.registry
    }

    pub fn graphs(&self) -> &Arc<GraphStore> {
        &self.graphs
    }

    pub fn authority(&self) -> &Arc<dyn ChangeControlAuthority> {
        &self.authority
    }

    fn claim(&self, execution_id: &ExecutionId) -> Option<Claim<'_>> {
        self.in_flight.insert(execution_id.clone()).then(|| Claim {
            set: &self.in_flight,
            execution_id: execution_id.clone(),
        })
    }

    /// Admission check for a queued free-form job.
    ///
    /// `None` permits scheduling; `Some` blocks the item with a reason.
    pub async fn evaluate_admission(&self, item: &QueueItem) -> Option<BlockingCause> {
        let execution_id = item.execution_id();

        // A landed decision is final.
        if self.registry.has_callback_content(&execution_id) {
            debug!(execution = %execution_id, "Callback result present, admitting");
            return None;
        }
        if !self.resolver.is_eligible(&item.job) {
            return None;
        }
        if let Some(blocked) = self.pending_block(&execution_id) {
            return blocked;
        }

        let Some(_claim) = self.claim(&execution_id) else {
            debug!(execution = %execution_id, "Registration in flight");
            return Some(BlockingCause::waiting_for_approval());
        };
        // Another poll may have finished between the checks and the claim.
        if self.registry.has_callback_content(&execution_id) {
            return None;
        }
        if let Some(blocked) = self.pending_block(&execution_id) {
            return blocked;
        }

        if !self.resolver.resolve_for_item(item).await.tracked {
            return None;
        }

        let target = JobTarget {
            job_url: item.job.url.clone(),
            job_name: item.job.name.clone(),
            stage: None,
            multi_branch: item.job.multi_branch,
            branch_name: None,
        };

        match self.authority.is_under_change_control(&target).await {
            Ok(ControlVerdict::Governed) => {
                info!(execution = %execution_id, job = %item.job.full_name, "Job is under change control");
            }
            Ok(ControlVerdict::NotGoverned) => {
                debug!(execution = %execution_id, "Job is not under change control");
                return None;
            }
            Ok(ControlVerdict::Unknown) => {
                warn!(execution = %execution_id, "Job is not associated with any change control step");
                self.registry
                    .set_callback_content(&execution_id, CallbackPayload::abort());
                return None;
            }
            Err(failure) => {
                warn!(execution = %execution_id, error = %failure, "Change control check failed");
                self.registry
                    .set_callback_content(&execution_id, CallbackPayload::abort());
                return None;
            }
        }

        let job_details = details::from_causes(&item.causes, &item.job, &self.config.base_url);
        match self
            .register(
                &execution_id,
                TokenKind::FreeformJob,
                target,
                job_details,
                item.job.change_request_details.as_deref(),
            )
            .await
        {
            Registration::Waiting => Some(BlockingCause::waiting_for_approval()),
            Registration::Failed(payload) => {
                self.registry.set_callback_content(&execution_id, payload);
                None
            }
            Registration::Resolved(_) => None,
        }
    }

    /// `Some(blocked?)` when a token is already registered for the execution.
    fn pending_block(&self, execution_id: &ExecutionId) -> Option<Option<BlockingCause>> {
        let token = self.registry.token_for(execution_id)?;
        if self.registry.is_waiting(&token) {
            debug!(execution = %execution_id, token = %token, "Waiting for callback");
            Some(Some(BlockingCause::waiting_for_approval()))
        } else {
            Some(None)
        }
    }

    /// Gate a pipeline stage. Nested stages share their root stage's episode.
    pub async fn evaluate_stage(&self, run: &RunContext, request: &StageRequest) -> StageDecision {
        let ignore_errors = run.job.ignore_errors;
        let (key, root_name) = self.episode_key(run, &request.stage_name);

        // A landed decision is final.
        if let Some(payload) = self.registry.callback_content(&key) {
            return self.stage_outcome(&payload, ignore_errors);
        }
        if !self.resolver.is_eligible(&run.job) {
            return StageDecision::Proceed;
        }

        let decision = self.resolver.resolve_for_run(run).await;
        if decision.unreachable {
            let message = decision
                .error_message
                .unwrap_or_else(|| REGISTRATION_ABORTED_MESSAGE.to_string());
            return self.stage_error(message, ignore_errors);
        }
        if !decision.tracked {
            return StageDecision::Proceed;
        }
        self.resolver.remember(run.tracking_key(), decision);

        let graph = self.graphs.get_or_create(&run.execution_id());
        if let Some(settled) = self.settled_stage(&graph, &key, &root_name, ignore_errors) {
            return settled;
        }

        let Some(_claim) = self.claim(&key) else {
            debug!(execution = %key, stage = %request.stage_name, "Sharing root stage episode");
            return StageDecision::Wait { execution_id: key };
        };
        if let Some(settled) = self.settled_stage(&graph, &key, &root_name, ignore_errors) {
            return settled;
        }

        let root = graph.resolve_root(&request.stage_name);
        let target = JobTarget {
            job_url: run.job.url.clone(),
            job_name: run.job.name.clone(),
            stage: Some(StageScope {
                stage_name: request.stage_name.clone(),
                root: graph.root_summary(&request.stage_name),
            }),
            multi_branch: run.job.multi_branch,
            branch_name: run.branch_name.clone(),
        };

        match self.authority.is_under_change_control(&target).await {
            Ok(ControlVerdict::Governed) => {
                info!(execution = %key, stage = %request.stage_name, "Stage is under change control");
            }
            Ok(ControlVerdict::NotGoverned) => return StageDecision::Proceed,
            Ok(ControlVerdict::Unknown) => {
                warn!(execution = %key, stage = %request.stage_name, "Could not find a step for stage");
                return StageDecision::Abort {
                    message: UNKNOWN_STAGE_MESSAGE.to_string(),
                };
            }
            Err(failure) => {
                warn!(execution = %key, error = %failure, "Change control check failed");
                return self.stage_error(failure.message, ignore_errors);
            }
        }

        let job_details = details::for_stage(
            &run.causes,
            &run.job,
            &self.config.base_url,
            root.as_ref().and_then(|n| n.upstream_task_execution_url.as_deref()),
            request.build_url.as_deref().unwrap_or(&run.build_url),
        );
        let change_request_details = request
            .change_request_details
            .as_deref()
            .or(run.job.change_request_details.as_deref());

        let registration = self
            .register(
                &key,
                TokenKind::StagedPipeline,
                target,
                job_details,
                change_request_details,
            )
            .await;

        match registration {
            Registration::Waiting => {
                mark_in_progress(&graph, [root_name.as_str(), request.stage_name.as_str()]);
                StageDecision::Wait { execution_id: key }
            }
            Registration::Failed(payload) => {
                self.registry.set_callback_content(&key, payload.clone());
                self.stage_outcome(&payload, ignore_errors)
            }
            Registration::Resolved(payload) => {
                mark_in_progress(&graph, [root_name.as_str(), request.stage_name.as_str()]);
                self.stage_outcome(&payload, ignore_errors)
            }
        }
    }

    /// Episode key for a stage: the run scoped to the stage's root.
    fn episode_key(&self, run: &RunContext, stage_name: &str) -> (ExecutionId, String) {
        let root_name = self
            .graphs
            .get(&run.execution_id())
            .and_then(|g| g.resolve_root(stage_name))
            .map(|n| n.name)
            .unwrap_or_else(|| stage_name.to_string());
        (run.execution_id().scoped_to_stage(&root_name), root_name)
    }

    /// Decision for an episode that needs no new registration.
    fn settled_stage(
        &self,
        graph: &PipelineGraph,
        key: &ExecutionId,
        root_name: &str,
        ignore_errors: bool,
    ) -> Option<StageDecision> {
        if let Some(payload) = self.registry.callback_content(key) {
            return Some(self.stage_outcome(&payload, ignore_errors));
        }
        if self.is_waiting_for(key) {
            return Some(StageDecision::Wait {
                execution_id: key.clone(),
            });
        }
        // Decided and consumed earlier in this run.
        if graph.is_change_control_in_progress(root_name) {
            debug!(execution = %key, "Root stage already went through change control");
            return Some(StageDecision::Proceed);
        }
        None
    }

    fn is_waiting_for(&self, execution_id: &ExecutionId) -> bool {
        self.registry
            .token_for(execution_id)
            .is_some_and(|token| self.registry.is_waiting(&token))
    }

    /// Current state of a stage without consuming the stored decision.
    pub fn stage_status(&self, run: &RunContext, stage_name: &str) -> StageDecision {
        let (key, _) = self.episode_key(run, stage_name);

        match self.registry.callback_content(&key) {
            Some(payload) => self.stage_outcome(&payload, run.job.ignore_errors),
            None if self.is_waiting_for(&key) || self.in_flight.contains(&key) => {
                StageDecision::Wait { execution_id: key }
            }
            None => StageDecision::Proceed,
        }
    }

    fn stage_outcome(&self, payload: &CallbackPayload, ignore_errors: bool) -> StageDecision {
        match decide(payload, ignore_errors) {
            GateDecision::Proceed | GateDecision::NoDecision => StageDecision::Proceed,
            GateDecision::Abort { message } => StageDecision::Abort { message },
        }
    }

    fn stage_error(&self, message: String, ignore_errors: bool) -> StageDecision {
        if ignore_errors {
            warn!(error = %message, "Ignoring change control error");
            StageDecision::Proceed
        } else {
            StageDecision::Abort { message }
        }
    }

    /// Issue a token, register it and notify the authority.
    ///
    /// On failure the token is unbound again. If a callback already
    /// resolved it, that callback's content stands.
    async fn register(
        &self,
        execution_id: &ExecutionId,
        kind: TokenKind,
        target: JobTarget,
        job_details: JobDetails,
        change_request_details: Option<&str>,
    ) -> Registration {
        let change_request_details = match change_request_details.filter(|s| !s.trim().is_empty()) {
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value @ Value::Object(_)) => Some(value),
                Ok(_) => {
                    return Registration::Failed(CallbackPayload::failure(format!(
                        "{} Expected a JSON object",
                        CHANGE_REQUEST_DETAILS_PARSE_ERROR
                    )));
                }
                Err(e) => {
                    warn!(execution = %execution_id, error = %e, "Invalid change request details");
                    return Registration::Failed(CallbackPayload::failure(format!(
                        "{} {}",
                        CHANGE_REQUEST_DETAILS_PARSE_ERROR, e
                    )));
                }
            },
            None => None,
        };

        let token = CallbackToken::issue(kind);
        let callback_url = match callback_url(&self.config.base_url, &token) {
            Ok(url) => url,
            Err(e) => {
                warn!(execution = %execution_id, error = %e, "Cannot build callback URL");
                return Registration::Failed(CallbackPayload::failure(e.to_string()));
            }
        };

        // Bound before notifying so an early callback finds it.
        self.registry.register(&token, execution_id);

        let request = RegistrationRequest {
            token: token.clone(),
            callback_url,
            target,
            job_details,
            change_request_details,
        };

        match self.authority.register_and_notify(&request).await {
            Ok(ControlVerdict::Governed) => {
                info!(execution = %execution_id, token = %token, "Registered for change control");
                Registration::Waiting
            }
            Ok(verdict) => {
                warn!(execution = %execution_id, verdict = %verdict, "Registration was not accepted");
                self.unbind_after_failure(execution_id, CallbackPayload::abort())
            }
            Err(failure) => {
                warn!(execution = %execution_id, error = %failure, "Registration failed");
                self.unbind_after_failure(execution_id, CallbackPayload::failure(failure.message))
            }
        }
    }

    fn unbind_after_failure(
        &self,
        execution_id: &ExecutionId,
        payload: CallbackPayload,
    ) -> Registration {
        if self.registry.remove_token(execution_id).is_some() {
            return Registration::Failed(payload);
        }
        match self.registry.callback_content(execution_id) {
            Some(landed) => {
                info!(execution = %execution_id, "Callback landed before the registration failed");
                Registration::Resolved(landed)
            }
            None => Registration::Failed(payload),
        }
    }

    /// Deliver a callback for an execution.
    ///
    /// Returns `None` when no token is waiting for the execution. A
    /// malformed payload is stored as a communication failure.
    pub async fn resolve_callback(
        &self,
        execution_id: &ExecutionId,
        raw: &str,
    ) -> Option<CallbackOutcome> {
        let payload = normalize(raw);
        let token = self.registry.resolve_execution(execution_id, payload.clone())?;
        Some(self.after_resolution(execution_id, &token, &payload).await)
    }

    /// Deliver a callback addressed by token, as posted by the authority.
    pub async fn resolve_callback_token(
        &self,
        token: &CallbackToken,
        raw: &str,
    ) -> Option<(ExecutionId, CallbackOutcome)> {
        let payload = normalize(raw);
        let execution_id = self.registry.resolve(token, payload.clone())?;
        let outcome = self.after_resolution(&execution_id, token, &payload).await;
        Some((execution_id, outcome))
    }

    async fn after_resolution(
        &self,
        execution_id: &ExecutionId,
        token: &CallbackToken,
        payload: &CallbackPayload,
    ) -> CallbackOutcome {
        let outcome = payload.outcome();
        info!(execution = %execution_id, token = %token, outcome = ?outcome, "Callback resolved");

        if outcome.is_canceled() {
            if let Err(e) = self.queue.cancel(execution_id).await {
                warn!(execution = %execution_id, error = %e, "Failed to remove canceled item");
            }
        }
        outcome
    }

    /// Remove and interpret the stored decision. A second call sees nothing.
    pub fn consume_decision(&self, execution_id: &ExecutionId, ignore_errors: bool) -> GateDecision {
        match self.registry.remove_callback_content(execution_id) {
            Some(payload) => decide(&payload, ignore_errors),
            None => GateDecision::NoDecision,
        }
    }

    /// Record a stage reported by the stage-status listener and make it current.
    pub fn on_stage_started(&self, execution_id: &ExecutionId, stage: StageInfo) -> Result<()> {
        let graph = self.graphs.get_or_create(execution_id);
        let node = graph.add_stage(stage);
        graph.set_current_stage(&node.name)
    }

    /// Drop everything held for an execution.
    pub fn teardown(&self, execution_id: &ExecutionId) {
        let purged = self.registry.purge_execution(execution_id);
        self.in_flight.retain(|id| !id.same_execution(execution_id));
        self.graphs.remove(execution_id);
        debug!(execution = %execution_id, purged, "Execution torn down");
    }

    /// Teardown for a finished run, including its queue item and cached tracking.
    pub fn teardown_run(&self, run: &RunContext) {
        self.teardown(&run.execution_id());
        if let Some(queue_id) = run.queue_execution_id() {
            self.teardown(&queue_id);
        }
        self.resolver.forget(&run.tracking_key());
    }
}

fn mark_in_progress<'a>(graph: &PipelineGraph, stages: impl IntoIterator<Item = &'a str>) {
    for stage in stages {
        if let Err(e) = graph.mark_change_control_in_progress(stage) {
            debug!(stage = %stage, error = %e, "Stage not in graph");
        }
    }
}

fn normalize(raw: &str) -> CallbackPayload {
    let payload = CallbackPayload::new(raw);
    if payload.is_well_formed() {
        payload
    } else {
        warn!("Malformed callback payload");
        CallbackPayload::comm_failure()
    }
}

fn decide(payload: &CallbackPayload, ignore_errors: bool) -> GateDecision {
    let message = match payload.outcome() {
        CallbackOutcome::Approved => return GateDecision::Proceed,
        CallbackOutcome::Canceled => {
            return GateDecision::Abort {
                message: CANCELED_MESSAGE.to_string(),
            };
        }
        CallbackOutcome::Unrecognized => {
            return GateDecision::Abort {
                message: format!("Change request was not approved: {}", payload),
            };
        }
        CallbackOutcome::CommFailure => COMM_FAILURE_MESSAGE.to_string(),
        CallbackOutcome::Aborted => REGISTRATION_ABORTED_MESSAGE.to_string(),
        CallbackOutcome::Failed(message) => message,
    };

    if ignore_errors {
        warn!(error = %message, "Ignoring change control error");
        GateDecision::Proceed
    } else {
        GateDecision::Abort { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthority, FakeQueue, item_of, job};
    use changegate_core::job::JobKind;
    use pretty_assertions::assert_eq;

    fn gate(authority: Arc<FakeAuthority>) -> ChangeGate {
        ChangeGate::new(
            GateConfig::new("tool", "https://cm.example.com/api")
                .with_base_url("https://ci.example.com/"),
            authority,
            Arc::new(FakeQueue::new()),
        )
    }

    #[test]
    fn test_decide() {
        assert_eq!(
            decide(&CallbackPayload::new(r#"{"result":"approved"}"#), false),
            GateDecision::Proceed
        );
        assert_eq!(
            decide(&CallbackPayload::failure("boom"), false),
            GateDecision::Abort {
                message: "boom".into()
            }
        );
        assert_eq!(decide(&CallbackPayload::failure("boom"), true), GateDecision::Proceed);
        assert_eq!(
            decide(&CallbackPayload::new(r#"{"result":"canceled"}"#), true),
            GateDecision::Abort {
                message: CANCELED_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn test_registration_payload() {
        let authority = Arc::new(FakeAuthority::governed());
        let gate = gate(authority.clone());
        let mut app = job("app", JobKind::Freestyle);
        app.change_request_details = Some(r#"{"short_description":"deploy"}"#.into());
        let item = item_of(app, 11);

        assert!(gate.evaluate_admission(&item).await.is_some());

        let request = authority.last_registration().unwrap();
        assert_eq!(
            request.callback_url,
            format!("https://ci.example.com/callback/{}", request.token)
        );
        assert_eq!(request.token.kind(), Some(TokenKind::FreeformJob));
        assert_eq!(
            request.change_request_details,
            Some(serde_json::json!({"short_description": "deploy"}))
        );
        assert_eq!(
            gate.registry().token_for(&item.execution_id()),
            Some(request.token)
        );
    }

    #[tokio::test]
    async fn test_bad_change_request_details_skip_remote_call() {
        let authority = Arc::new(FakeAuthority::governed());
        let gate = gate(authority.clone());
        let mut app = job("app", JobKind::Freestyle);
        app.change_request_details = Some("{not json".into());
        let item = item_of(app, 12);

        assert!(gate.evaluate_admission(&item).await.is_none());
        assert_eq!(authority.registration_calls(), 0);

        match gate.consume_decision(&item.execution_id(), false) {
            GateDecision::Abort { message } => {
                assert!(message.starts_with(CHANGE_REQUEST_DETAILS_PARSE_ERROR))
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_verdict_aborts() {
        let authority = Arc::new(FakeAuthority::governed());
        authority.set_control(Ok(ControlVerdict::Unknown));
        let gate = gate(authority.clone());
        let item = item_of(job("app", JobKind::Maven), 13);

        assert!(gate.evaluate_admission(&item).await.is_none());
        assert_eq!(authority.registration_calls(), 0);
        assert_eq!(
            gate.consume_decision(&item.execution_id(), false),
            GateDecision::Abort {
                message: REGISTRATION_ABORTED_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_callback_is_comm_failure() {
        let authority = Arc::new(FakeAuthority::governed());
        let gate = gate(authority);
        let item = item_of(job("app", JobKind::Freestyle), 14);
        gate.evaluate_admission(&item).await;

        let outcome = gate
            .resolve_callback(&item.execution_id(), "<html>")
            .await;
        assert_eq!(outcome, Some(CallbackOutcome::CommFailure));
        assert!(gate.evaluate_admission(&item).await.is_none());
        assert_eq!(
            gate.consume_decision(&item.execution_id(), false),
            GateDecision::Abort {
                message: COMM_FAILURE_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn test_callback_without_token_is_ignored() {
        let gate = gate(Arc::new(FakeAuthority::governed()));
        let id = ExecutionId::for_queue_item(99, "job/app/");
        assert_eq!(
            gate.resolve_callback(&id, r#"{"result":"approved"}"#).await,
            None
        );
        assert!(!gate.registry().has_callback_content(&id));
    }

    #[tokio::test]
    async fn test_teardown_purges() {
        let authority = Arc::new(FakeAuthority::governed());
        let gate = gate(authority);
        let item = item_of(job("app", JobKind::Freestyle), 15);
        gate.evaluate_admission(&item).await;
        assert_eq!(gate.registry().pending(), 1);

        gate.teardown(&item.execution_id());
        assert_eq!(gate.registry().pending(), 0);
        assert!(gate.graphs().is_empty());
    }
}
