//! Router tests driven through `tower::ServiceExt::oneshot`.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use changegate_api::{AppState, create_router};
use changegate_core::{CallbackToken, ExecutionId, TokenKind};
use changegate_engine::testing::{FakeAuthority, FakeQueue};
use changegate_engine::{ChangeGate, GateConfig, GateDecision};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    gate: Arc<ChangeGate>,
    authority: Arc<FakeAuthority>,
    queue: Arc<FakeQueue>,
    router: Router,
}

fn harness(config: GateConfig) -> Harness {
    let authority = Arc::new(FakeAuthority::governed());
    let queue = Arc::new(FakeQueue::new());
    let gate = Arc::new(ChangeGate::new(config, authority.clone(), queue.clone()));
    let router = create_router(Arc::new(AppState::new(gate.clone())));
    Harness {
        gate,
        authority,
        queue,
        router,
    }
}

fn gate_config() -> GateConfig {
    GateConfig::new("tool-1", "https://cm.example.com/api").with_base_url("https://ci.example.com/")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn job_json(name: &str, kind: &str) -> Value {
    json!({
        "full_name": name,
        "name": name,
        "url": format!("https://ci.example.com/job/{}/", name),
        "path": format!("job/{}/", name),
        "kind": kind
    })
}

fn run_json(name: &str, run_id: &str) -> Value {
    json!({
        "run_id": run_id,
        "job": job_json(name, "pipeline"),
        "build_url": format!("https://ci.example.com/job/{}/{}/", name, run_id)
    })
}

fn waiting(gate: &ChangeGate) -> (CallbackToken, ExecutionId) {
    let token = CallbackToken::issue(TokenKind::FreeformJob);
    let execution_id = ExecutionId::for_queue_item(7, "https://ci.example.com/job/app/");
    gate.registry().register(&token, &execution_id);
    (token, execution_id)
}

fn post_callback(token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/callback/{}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_approved_callback_is_accepted() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));
    let (token, execution_id) = waiting(&h.gate);

    let response = h
        .router
        .oneshot(post_callback(token.as_str(), r#"{"result":"approved"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "approved");
    assert_eq!(body["execution"], execution_id.to_string());

    assert!(!h.gate.registry().is_waiting(&token));
    assert_eq!(
        h.gate.consume_decision(&execution_id, false),
        GateDecision::Proceed
    );
}

#[tokio::test]
async fn test_second_delivery_is_not_found() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));
    let (token, _) = waiting(&h.gate);

    let first = h
        .router
        .clone()
        .oneshot(post_callback(token.as_str(), r#"{"result":"approved"}"#))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = h
        .router
        .oneshot(post_callback(token.as_str(), r#"{"result":"canceled"}"#))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));

    let response = h
        .router
        .oneshot(post_callback("freestyle:nope", r#"{"result":"approved"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_canceled_callback_removes_queued_item() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));
    let (token, execution_id) = waiting(&h.gate);

    let response = h
        .router
        .oneshot(post_callback(token.as_str(), r#"{"result":"canceled"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(h.queue.canceled(), vec![execution_id]);
}

#[tokio::test]
async fn test_malformed_body_becomes_comm_failure() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));
    let (token, execution_id) = waiting(&h.gate);

    let response = h
        .router
        .oneshot(post_callback(token.as_str(), "not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["outcome"], "comm_failure");
    assert!(matches!(
        h.gate.consume_decision(&execution_id, false),
        GateDecision::Abort { .. }
    ));
}

#[tokio::test]
async fn test_health_reports_pending_callbacks() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));
    waiting(&h.gate);

    let response = h
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["pending_callbacks"], 1);
}

#[tokio::test]
async fn test_ready_fails_when_misconfigured() {
    let h = harness(GateConfig::new("", "https://cm.example.com/api"));

    let response = h
        .router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_header() {
    let h = harness(GateConfig::new("tool-1", "https://cm.example.com/api"));

    let response = h
        .router
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let response = h
        .router
        .oneshot(
            Request::builder()
                .uri("/ready")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_admission_callback_and_consume_over_http() {
    let h = harness(gate_config());
    let item = json!({
        "id": 40,
        "job": job_json("deploy", "freestyle"),
        "causes": [{ "type": "user", "user_name": "alice", "description": "Started by alice" }]
    });

    let (status, body) = call(&h.router, post_json("/api/v1/admission", item.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);
    assert_eq!(body["reason"], "Job is waiting for approval");
    let execution: ExecutionId = serde_json::from_value(body["execution"].clone()).unwrap();

    // Repeated polls do not register again.
    let (_, body) = call(&h.router, post_json("/api/v1/admission", item.clone())).await;
    assert_eq!(body["blocked"], true);
    assert_eq!(h.authority.registration_calls(), 1);

    let token = h.gate.registry().token_for(&execution).unwrap();
    let (status, _) = call(
        &h.router,
        post_callback(token.as_str(), r#"{"result":"approved"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = call(&h.router, post_json("/api/v1/admission", item)).await;
    assert_eq!(body["blocked"], false);

    let consume = json!({ "execution": execution });
    let (_, body) = call(&h.router, post_json("/api/v1/decisions/consume", consume.clone())).await;
    assert_eq!(body["decision"], "proceed");
    let (_, body) = call(&h.router, post_json("/api/v1/decisions/consume", consume)).await;
    assert_eq!(body["decision"], "none");
}

#[tokio::test]
async fn test_stage_gating_over_http() {
    let h = harness(gate_config());
    let run = run_json("app", "9");

    for stage in [
        json!({ "id": "10", "name": "Release" }),
        json!({ "id": "11", "name": "Deploy", "parent_id": "10" }),
    ] {
        let (status, _) = call(
            &h.router,
            post_json("/api/v1/stages/started", json!({ "run": run, "stage": stage })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let evaluate = json!({ "run": run, "stage_name": "Deploy" });
    let (_, body) = call(&h.router, post_json("/api/v1/stages/evaluate", evaluate)).await;
    assert_eq!(body["decision"], "wait");
    let execution: ExecutionId = serde_json::from_value(body["execution"].clone()).unwrap();
    assert_eq!(execution.stage(), Some("Release"));

    let token = h.gate.registry().token_for(&execution).unwrap();
    call(
        &h.router,
        post_callback(token.as_str(), r#"{"result":"approved"}"#),
    )
    .await;

    let status = json!({ "run": run, "stage_name": "Release" });
    let (_, body) = call(&h.router, post_json("/api/v1/stages/status", status)).await;
    assert_eq!(body["decision"], "proceed");

    let (_, body) = call(
        &h.router,
        post_json("/api/v1/decisions/consume", json!({ "execution": execution })),
    )
    .await;
    assert_eq!(body["decision"], "proceed");

    let evaluate = json!({ "run": run, "stage_name": "Release" });
    let (_, body) = call(&h.router, post_json("/api/v1/stages/evaluate", evaluate)).await;
    assert_eq!(body["decision"], "proceed");
    assert_eq!(h.authority.registration_calls(), 1);

    let map = json!({ "run": run, "stage_name": "Deploy", "step_id": "step-1" });
    let (status, body) = call(&h.router, post_json("/api/v1/steps/map", map)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["associated"], true);
    assert_eq!(h.authority.mapping_calls(), 1);

    let (status, _) = call(
        &h.router,
        post_json("/api/v1/executions/teardown", json!({ "run": run })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.gate.graphs().is_empty());
}

#[tokio::test]
async fn test_failed_step_mapping_is_unprocessable() {
    let h = harness(gate_config());
    h.authority.set_mapping(Ok(false));
    let run = run_json("app", "12");

    call(
        &h.router,
        post_json(
            "/api/v1/stages/evaluate",
            json!({ "run": run, "stage_name": "Build" }),
        ),
    )
    .await;

    let map = json!({ "run": run, "stage_name": "Build", "step_id": "step-2" });
    let (status, body) = call(&h.router, post_json("/api/v1/steps/map", map)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["associated"], false);
    assert!(body["error"].as_str().unwrap().contains("Step could not be associated"));
}

#[tokio::test]
async fn test_teardown_needs_a_target() {
    let h = harness(gate_config());
    let (status, _) = call(
        &h.router,
        post_json("/api/v1/executions/teardown", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
