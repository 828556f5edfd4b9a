//! Port traits.
//!
//! These traits define the interfaces between the gating engine and the
//! systems it mediates: the external change-management authority and the
//! scheduler that owns the queue.

use crate::ids::ExecutionId;
use crate::job::Cause;
use crate::wire::{
    ControlVerdict, JobTarget, RegistrationRequest, RemoteResult, StepMappingRequest,
    TrackingQuery, TrackingResponse,
};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// External change-management authority.
///
/// Implementations perform one bounded call per method and never retry;
/// every failure is returned as a classified [`RemoteFailure`](crate::wire::RemoteFailure).
#[async_trait]
pub trait ChangeControlAuthority: Send + Sync {
    /// Ask whether a job is tracked for change control.
    async fn tracking_query(&self, query: &TrackingQuery) -> RemoteResult<TrackingResponse>;

    /// Ask whether a job (or stage) is currently under change control.
    async fn is_under_change_control(&self, target: &JobTarget) -> RemoteResult<ControlVerdict>;

    /// Register a callback token and notify the authority.
    ///
    /// `Governed` means governance is confirmed and the webhook accepted.
    async fn register_and_notify(
        &self,
        request: &RegistrationRequest,
    ) -> RemoteResult<ControlVerdict>;

    /// Associate a step with a stage. Returns whether the mapping was accepted.
    async fn update_step_mapping(&self, request: &StepMappingRequest) -> RemoteResult<bool>;
}

/// The scheduler's queue, as seen by the gate.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a new scheduling request. Returns whether it was accepted.
    async fn schedule(
        &self,
        job_full_name: &str,
        quiet_period: Duration,
        causes: Vec<Cause>,
    ) -> Result<bool>;

    /// Remove a queued item entirely.
    async fn cancel(&self, execution_id: &ExecutionId) -> Result<()>;
}
