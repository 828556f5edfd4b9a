//! API route definitions.

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use changegate_core::urls::CALLBACK_PATH;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{callback, executions, health};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route(
            &format!("/{}/{{token}}", CALLBACK_PATH),
            post(callback::receive_callback),
        )
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admission", post(executions::evaluate_admission))
        .nest("/stages", stage_routes())
        .route("/steps/map", post(executions::map_step))
        .route("/decisions/consume", post(executions::consume_decision))
        .route("/executions/teardown", post(executions::teardown))
}

fn stage_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/evaluate", post(executions::evaluate_stage))
        .route("/status", post(executions::stage_status))
        .route("/started", post(executions::stage_started))
}
