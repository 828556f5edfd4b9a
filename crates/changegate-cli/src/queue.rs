//! Scheduler port for the standalone server.
//!
//! The server has no scheduler of its own. Cancellations are recorded so
//! an embedding scheduler can drain them; resubmissions are refused.

use async_trait::async_trait;
use changegate_core::job::Cause;
use changegate_core::ports::JobQueue;
use changegate_core::{ExecutionId, Result};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Default)]
pub struct DetachedQueue {
    canceled: Mutex<Vec<ExecutionId>>,
}

impl DetachedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the cancellations recorded so far.
    pub fn drain_canceled(&self) -> Vec<ExecutionId> {
        let mut canceled = self
            .canceled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *canceled)
    }
}

#[async_trait]
impl JobQueue for DetachedQueue {
    async fn schedule(
        &self,
        job_full_name: &str,
        quiet_period: Duration,
        causes: Vec<Cause>,
    ) -> Result<bool> {
        warn!(
            job = %job_full_name,
            quiet_period_ms = quiet_period.as_millis() as u64,
            causes = causes.len(),
            "No scheduler attached, resubmission dropped"
        );
        Ok(false)
    }

    async fn cancel(&self, execution_id: &ExecutionId) -> Result<()> {
        info!(execution = %execution_id, "Queued execution canceled");
        self.canceled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(execution_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_cancellations() {
        let queue = DetachedQueue::new();
        let id = ExecutionId::for_queue_item(3, "https://ci.example.com/job/app/");

        queue.cancel(&id).await.unwrap();
        assert!(!queue.schedule("app", Duration::ZERO, vec![]).await.unwrap());

        assert_eq!(queue.drain_canceled(), vec![id]);
        assert!(queue.drain_canceled().is_empty());
    }
}
