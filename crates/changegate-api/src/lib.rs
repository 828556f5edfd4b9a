//! HTTP API server for changegate.
//!
//! Receives decisions posted back by the change-management authority and
//! hands them to the [`ChangeGate`](changegate_engine::ChangeGate). The
//! `/api/v1` routes let an external scheduler drive admission and stage gating.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
