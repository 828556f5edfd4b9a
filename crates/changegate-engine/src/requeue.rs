//! Re-admission of triggers that accumulated behind a governed run.

use changegate_core::Result;
use changegate_core::job::{Cause, RunContext};
use changegate_core::ports::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Resubmits upstream triggers merged into a run while it was waiting.
pub struct RequeueHelper {
    queue: Arc<dyn JobQueue>,
}

impl RequeueHelper {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Schedule the run's job again with every upstream cause after the
    /// first. Returns whether the scheduler accepted a new item.
    pub async fn schedule_next(&self, run: &RunContext, quiet_period: Duration) -> Result<bool> {
        if run.causes.len() <= 1 {
            return Ok(false);
        }

        let causes = upstream_causes(&run.causes);
        debug!(
            job = %run.job.full_name,
            causes = causes.len(),
            "Resubmitting accumulated triggers"
        );
        let created = self
            .queue
            .schedule(&run.job.full_name, quiet_period, causes)
            .await?;
        if created {
            info!(job = %run.job.full_name, "Follow-up run scheduled");
        }
        Ok(created)
    }
}

/// Upstream causes, skipping the one that started the current run.
fn upstream_causes(causes: &[Cause]) -> Vec<Cause> {
    causes
        .iter()
        .skip(1)
        .filter(|c| c.is_upstream())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeQueue, job, run_of};
    use changegate_core::job::JobKind;
    use pretty_assertions::assert_eq;

    fn upstream(build: u64) -> Cause {
        Cause::Upstream {
            upstream_url: "job/build/".into(),
            upstream_build: build,
            description: format!("Started by upstream build #{}", build),
        }
    }

    #[tokio::test]
    async fn test_single_cause_is_not_resubmitted() {
        let queue = Arc::new(FakeQueue::new());
        let helper = RequeueHelper::new(queue.clone());
        let mut run = run_of(job("app", JobKind::Freestyle), "1");
        run.causes = vec![upstream(1)];

        assert!(!helper.schedule_next(&run, Duration::ZERO).await.unwrap());
        assert!(queue.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_resubmits_trailing_upstream_causes() {
        let queue = Arc::new(FakeQueue::new());
        let helper = RequeueHelper::new(queue.clone());
        let mut run = run_of(job("app", JobKind::Freestyle), "1");
        run.causes = vec![
            upstream(1),
            Cause::Other {
                description: "Timer".into(),
            },
            upstream(2),
            upstream(3),
        ];

        assert!(helper
            .schedule_next(&run, Duration::from_secs(5))
            .await
            .unwrap());
        let scheduled = queue.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].job_full_name, "app");
        assert_eq!(scheduled[0].quiet_period, Duration::from_secs(5));
        assert_eq!(scheduled[0].causes, vec![upstream(2), upstream(3)]);
    }

    #[tokio::test]
    async fn test_submits_even_without_upstream_causes() {
        let queue = Arc::new(FakeQueue::new());
        let helper = RequeueHelper::new(queue.clone());
        let mut run = run_of(job("app", JobKind::Freestyle), "1");
        run.causes = vec![
            upstream(1),
            Cause::Other {
                description: "Timer".into(),
            },
        ];

        assert!(helper.schedule_next(&run, Duration::ZERO).await.unwrap());
        assert!(queue.scheduled()[0].causes.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_schedule() {
        let queue = Arc::new(FakeQueue::new());
        queue.set_accept(false);
        let helper = RequeueHelper::new(queue.clone());
        let mut run = run_of(job("app", JobKind::Freestyle), "1");
        run.causes = vec![upstream(1), upstream(2)];

        assert!(!helper.schedule_next(&run, Duration::ZERO).await.unwrap());
    }
}
