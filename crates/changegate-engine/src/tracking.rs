//! Tracking resolution: is an execution governed by change control?

use crate::config::GateConfig;
use changegate_core::job::{JobMetadata, QueueItem, RunContext};
use changegate_core::ports::ChangeControlAuthority;
use changegate_core::wire::{FailureKind, RemoteFailure, TrackingQuery};
use changegate_core::{FailureReason, TrackingDecision, TrackingKey};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decides whether executions are governed and caches positive answers per run.
pub struct TrackingResolver {
    authority: Arc<dyn ChangeControlAuthority>,
    config: Arc<GateConfig>,
    cache: DashMap<TrackingKey, TrackingDecision>,
}

impl TrackingResolver {
    pub fn new(authority: Arc<dyn ChangeControlAuthority>, config: Arc<GateConfig>) -> Self {
        Self {
            authority,
            config,
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether the job kind is supported and gating is switched on.
    pub fn is_eligible(&self, job: &JobMetadata) -> bool {
        job.kind.supports_governance() && self.config.enabled
    }

    /// Short-circuit decision when no remote call must be made.
    fn precheck(&self, job: &JobMetadata) -> Option<TrackingDecision> {
        if !self.is_eligible(job) {
            return Some(TrackingDecision::untracked());
        }
        if !self.config.is_valid() {
            warn!(job = %job.full_name, "Change control is enabled but misconfigured");
            return Some(TrackingDecision::unreachable(
                FailureReason::InvalidConfiguration,
            ));
        }
        None
    }

    /// Resolve for a queued item. No run exists yet, so the cache is not consulted.
    pub async fn resolve_for_item(&self, item: &QueueItem) -> TrackingDecision {
        if let Some(decision) = self.precheck(&item.job) {
            return decision;
        }
        self.query_endpoint(&item.job, None, false).await
    }

    /// Resolve for a concrete run, consulting the cache first.
    pub async fn resolve_for_run(&self, run: &RunContext) -> TrackingDecision {
        if let Some(decision) = self.precheck(&run.job) {
            return decision;
        }

        let key = run.tracking_key();
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "Tracking cache hit");
            return cached.clone();
        }

        self.query_endpoint(
            &run.job,
            run.branch_name.clone(),
            run.job.multi_branch,
        )
        .await
    }

    async fn query_endpoint(
        &self,
        job: &JobMetadata,
        branch_name: Option<String>,
        multi_branch: bool,
    ) -> TrackingDecision {
        let query = TrackingQuery {
            url: job.url.clone(),
            name: job.full_name.clone(),
            pronoun: job.kind.clone(),
            branch_name,
            is_multi_branch: multi_branch,
        };

        let decision = match self.authority.tracking_query(&query).await {
            Ok(response) if response.tracked => TrackingDecision::tracked_with(response.test_info),
            Ok(_) => TrackingDecision::untracked(),
            Err(failure) => decision_for_failure(job, &failure),
        };

        debug!(
            job = %job.full_name,
            tracked = decision.tracked,
            unreachable = decision.unreachable,
            "Tracking resolved"
        );
        decision
    }

    /// Cache a positive decision for a run. Existing entries are kept.
    pub fn remember(&self, key: TrackingKey, decision: TrackingDecision) {
        if !decision.tracked {
            return;
        }
        self.cache.entry(key).or_insert_with(|| {
            info!("Run is governed by change control");
            decision
        });
    }

    /// Whether a governed decision is cached for this run.
    pub fn is_tracked_cached(&self, job: &JobMetadata, run_id: &str) -> bool {
        if !self.is_eligible(job) {
            return false;
        }
        self.cache
            .get(&job.tracking_key(run_id))
            .is_some_and(|d| d.tracked)
    }

    /// Full cached decision for a run, including test info.
    pub fn pipeline_info(&self, job: &JobMetadata, run_id: &str) -> TrackingDecision {
        if let Some(decision) = self.precheck(job) {
            return decision;
        }
        self.cache
            .get(&job.tracking_key(run_id))
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn forget(&self, key: &TrackingKey) -> Option<TrackingDecision> {
        self.cache.remove(key).map(|(_, d)| d)
    }

    pub fn cached_runs(&self) -> usize {
        self.cache.len()
    }
}

fn decision_for_failure(job: &JobMetadata, failure: &RemoteFailure) -> TrackingDecision {
    match failure.kind {
        FailureKind::ConnectionRefused => {
            TrackingDecision::unreachable(FailureReason::ConnectionRefused)
        }
        FailureKind::Unauthorized => TrackingDecision::unreachable(FailureReason::Unauthorized),
        // Free-form jobs may legitimately be absent from the authority's catalogue.
        FailureKind::DetailsNotFound if job.kind.is_freeform() => TrackingDecision::untracked(),
        _ => {
            warn!(job = %job.full_name, error = %failure, "Tracking query failed");
            TrackingDecision::unreachable(FailureReason::Generic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthority, job, run_of};
    use changegate_core::job::JobKind;
    use changegate_core::wire::TrackingResponse;
    use pretty_assertions::assert_eq;

    fn resolver(authority: Arc<FakeAuthority>) -> TrackingResolver {
        TrackingResolver::new(
            authority,
            Arc::new(GateConfig::new("tool", "https://cm.example.com/api")),
        )
    }

    #[tokio::test]
    async fn test_disabled_makes_no_call() {
        let authority = Arc::new(FakeAuthority::new());
        let resolver = TrackingResolver::new(
            authority.clone(),
            Arc::new(GateConfig::new("tool", "https://cm.example.com/api").with_enabled(false)),
        );
        let decision = resolver
            .resolve_for_run(&run_of(job("app", JobKind::Pipeline), "1"))
            .await;
        assert_eq!(decision, TrackingDecision::untracked());
        assert_eq!(authority.tracking_calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_kind_makes_no_call() {
        let authority = Arc::new(FakeAuthority::new());
        let resolver = resolver(authority.clone());
        let decision = resolver
            .resolve_for_run(&run_of(job("f", JobKind::Other("folder".into())), "1"))
            .await;
        assert!(!decision.tracked);
        assert_eq!(authority.tracking_calls(), 0);
    }

    #[tokio::test]
    async fn test_misconfigured_is_unreachable() {
        let authority = Arc::new(FakeAuthority::new());
        let resolver = TrackingResolver::new(
            authority.clone(),
            Arc::new(GateConfig::new("", "https://cm.example.com/api")),
        );
        let decision = resolver
            .resolve_for_run(&run_of(job("app", JobKind::Freestyle), "1"))
            .await;
        assert!(decision.unreachable);
        assert_eq!(
            decision.error_message.as_deref(),
            Some(FailureReason::InvalidConfiguration.message())
        );
        assert_eq!(authority.tracking_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_short_circuits() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_tracking(Ok(TrackingResponse {
            tracked: true,
            test_info: None,
        }));
        let resolver = resolver(authority.clone());
        let run = run_of(job("app", JobKind::Pipeline), "7");

        let first = resolver.resolve_for_run(&run).await;
        assert!(first.tracked);
        resolver.remember(run.tracking_key(), first);

        let second = resolver.resolve_for_run(&run).await;
        assert!(second.tracked);
        assert_eq!(authority.tracking_calls(), 1);
    }

    #[tokio::test]
    async fn test_item_resolution_ignores_cache() {
        let authority = Arc::new(FakeAuthority::new());
        let resolver = resolver(authority.clone());
        let run = run_of(job("app", JobKind::Freestyle), "7");
        resolver.remember(run.tracking_key(), TrackingDecision::tracked());

        let item = QueueItem {
            id: 3,
            job: run.job.clone(),
            causes: vec![],
        };
        resolver.resolve_for_item(&item).await;
        assert_eq!(authority.tracking_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_mapping() {
        let authority = Arc::new(FakeAuthority::new());
        let resolver = resolver(authority.clone());

        authority.set_tracking(Err(RemoteFailure::new(
            FailureKind::DetailsNotFound,
            "pipeline details not found",
        )));
        let freestyle = resolver
            .resolve_for_run(&run_of(job("fs", JobKind::Freestyle), "1"))
            .await;
        assert_eq!(freestyle, TrackingDecision::untracked());

        let pipeline = resolver
            .resolve_for_run(&run_of(job("pl", JobKind::Pipeline), "1"))
            .await;
        assert_eq!(pipeline, TrackingDecision::unreachable(FailureReason::Generic));

        authority.set_tracking(Err(RemoteFailure::new(
            FailureKind::Unauthorized,
            "401",
        )));
        let unauthorized = resolver
            .resolve_for_run(&run_of(job("pl", JobKind::Pipeline), "2"))
            .await;
        assert_eq!(
            unauthorized,
            TrackingDecision::unreachable(FailureReason::Unauthorized)
        );
    }

    #[test]
    fn test_remember_keeps_first_and_ignores_untracked() {
        let resolver = resolver(Arc::new(FakeAuthority::new()));
        let key = TrackingKey::new("app", "1");
        resolver.remember(key.clone(), TrackingDecision::untracked());
        assert_eq!(resolver.cached_runs(), 0);

        let info = serde_json::json!({ "stage": "test" });
        resolver.remember(key.clone(), TrackingDecision::tracked_with(Some(info.clone())));
        resolver.remember(key.clone(), TrackingDecision::tracked());
        assert_eq!(
            resolver.forget(&key).and_then(|d| d.test_info),
            Some(info)
        );
    }
}
