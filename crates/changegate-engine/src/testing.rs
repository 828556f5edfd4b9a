//! In-memory fakes of the authority and queue ports.
//!
//! Responses are scripted per call kind and every call is counted, so tests
//! can assert how often the authority was contacted.

use async_trait::async_trait;
use changegate_core::job::{Cause, JobKind, JobMetadata, QueueItem, RunContext};
use changegate_core::ports::{ChangeControlAuthority, JobQueue};
use changegate_core::wire::{
    ControlVerdict, JobTarget, RegistrationRequest, RemoteResult, StepMappingRequest,
    TrackingQuery, TrackingResponse,
};
use changegate_core::{ExecutionId, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted change-management authority.
pub struct FakeAuthority {
    tracking: Mutex<RemoteResult<TrackingResponse>>,
    control: Mutex<RemoteResult<ControlVerdict>>,
    registration: Mutex<RemoteResult<ControlVerdict>>,
    mapping: Mutex<RemoteResult<bool>>,
    registration_delay: Mutex<Duration>,
    tracking_calls: AtomicUsize,
    control_calls: AtomicUsize,
    registration_calls: AtomicUsize,
    mapping_calls: AtomicUsize,
    registrations: Mutex<Vec<RegistrationRequest>>,
    control_targets: Mutex<Vec<JobTarget>>,
    mappings: Mutex<Vec<StepMappingRequest>>,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAuthority {
    /// Nothing is tracked.
    pub fn new() -> Self {
        Self {
            tracking: Mutex::new(Ok(TrackingResponse {
                tracked: false,
                test_info: None,
            })),
            control: Mutex::new(Ok(ControlVerdict::NotGoverned)),
            registration: Mutex::new(Ok(ControlVerdict::Governed)),
            mapping: Mutex::new(Ok(true)),
            registration_delay: Mutex::new(Duration::ZERO),
            tracking_calls: AtomicUsize::new(0),
            control_calls: AtomicUsize::new(0),
            registration_calls: AtomicUsize::new(0),
            mapping_calls: AtomicUsize::new(0),
            registrations: Mutex::new(Vec::new()),
            control_targets: Mutex::new(Vec::new()),
            mappings: Mutex::new(Vec::new()),
        }
    }

    /// Everything is tracked, governed and accepted.
    pub fn governed() -> Self {
        let authority = Self::new();
        authority.set_tracking(Ok(TrackingResponse {
            tracked: true,
            test_info: None,
        }));
        authority.set_control(Ok(ControlVerdict::Governed));
        authority
    }

    pub fn set_tracking(&self, response: RemoteResult<TrackingResponse>) {
        *lock(&self.tracking) = response;
    }

    pub fn set_control(&self, response: RemoteResult<ControlVerdict>) {
        *lock(&self.control) = response;
    }

    pub fn set_registration(&self, response: RemoteResult<ControlVerdict>) {
        *lock(&self.registration) = response;
    }

    pub fn set_mapping(&self, response: RemoteResult<bool>) {
        *lock(&self.mapping) = response;
    }

    /// Delay registrations, widening race windows in concurrency tests.
    pub fn set_registration_delay(&self, delay: Duration) {
        *lock(&self.registration_delay) = delay;
    }

    pub fn tracking_calls(&self) -> usize {
        self.tracking_calls.load(Ordering::SeqCst)
    }

    pub fn control_calls(&self) -> usize {
        self.control_calls.load(Ordering::SeqCst)
    }

    pub fn registration_calls(&self) -> usize {
        self.registration_calls.load(Ordering::SeqCst)
    }

    pub fn mapping_calls(&self) -> usize {
        self.mapping_calls.load(Ordering::SeqCst)
    }

    pub fn last_registration(&self) -> Option<RegistrationRequest> {
        lock(&self.registrations).last().cloned()
    }

    pub fn control_targets(&self) -> Vec<JobTarget> {
        lock(&self.control_targets).clone()
    }

    pub fn mappings(&self) -> Vec<StepMappingRequest> {
        lock(&self.mappings).clone()
    }
}

#[async_trait]
impl ChangeControlAuthority for FakeAuthority {
    async fn tracking_query(&self, _query: &TrackingQuery) -> RemoteResult<TrackingResponse> {
        self.tracking_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tracking).clone()
    }

    async fn is_under_change_control(&self, target: &JobTarget) -> RemoteResult<ControlVerdict> {
        self.control_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.control_targets).push(target.clone());
        lock(&self.control).clone()
    }

    async fn register_and_notify(
        &self,
        request: &RegistrationRequest,
    ) -> RemoteResult<ControlVerdict> {
        self.registration_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.registrations).push(request.clone());
        let delay = *lock(&self.registration_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.registration).clone()
    }

    async fn update_step_mapping(&self, request: &StepMappingRequest) -> RemoteResult<bool> {
        self.mapping_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.mappings).push(request.clone());
        lock(&self.mapping).clone()
    }
}

/// A scheduling request captured by [`FakeQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub job_full_name: String,
    pub quiet_period: Duration,
    pub causes: Vec<Cause>,
}

/// Scheduler queue that records requests.
pub struct FakeQueue {
    accept: Mutex<bool>,
    scheduled: Mutex<Vec<ScheduledJob>>,
    canceled: Mutex<Vec<ExecutionId>>,
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            accept: Mutex::new(true),
            scheduled: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        *lock(&self.accept) = accept;
    }

    pub fn scheduled(&self) -> Vec<ScheduledJob> {
        lock(&self.scheduled).clone()
    }

    pub fn canceled(&self) -> Vec<ExecutionId> {
        lock(&self.canceled).clone()
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn schedule(
        &self,
        job_full_name: &str,
        quiet_period: Duration,
        causes: Vec<Cause>,
    ) -> Result<bool> {
        let accept = *lock(&self.accept);
        if accept {
            lock(&self.scheduled).push(ScheduledJob {
                job_full_name: job_full_name.to_string(),
                quiet_period,
                causes,
            });
        }
        Ok(accept)
    }

    async fn cancel(&self, execution_id: &ExecutionId) -> Result<()> {
        lock(&self.canceled).push(execution_id.clone());
        Ok(())
    }
}

/// Job named `name` under `https://ci.example.com/job/{name}/`.
pub fn job(name: &str, kind: JobKind) -> JobMetadata {
    JobMetadata {
        full_name: name.to_string(),
        name: name.to_string(),
        url: format!("https://ci.example.com/job/{}/", name),
        path: format!("job/{}/", name),
        multi_branch: matches!(kind, JobKind::MultiBranchPipeline),
        kind,
        last_build_url: None,
        change_request_details: None,
        ignore_errors: false,
    }
}

pub fn item_of(job: JobMetadata, id: u64) -> QueueItem {
    QueueItem {
        id,
        job,
        causes: vec![Cause::User {
            user_name: "alice".to_string(),
            description: "Started by user alice".to_string(),
        }],
    }
}

pub fn run_of(job: JobMetadata, run_id: &str) -> RunContext {
    RunContext {
        run_id: run_id.to_string(),
        queue_id: None,
        build_url: format!("{}{}/", job.url, run_id),
        job,
        causes: Vec::new(),
        branch_name: None,
    }
}
