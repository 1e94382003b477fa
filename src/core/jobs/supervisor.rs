//! Supervised background job tasks
//!
//! Every job runs as its own task on a [`TaskTracker`]. A task is bounded by
//! the per-job deadline and by the supervisor's [`CancellationToken`]; when
//! either fires first the job is marked FAILED in the registry so no job
//! stays IN_PROGRESS once its task is gone.

use super::registry::JobRegistry;
use crate::domain::{FailureKind, Job, JobId, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct JobSupervisor {
    tracker: TaskTracker,
    cancel: CancellationToken,
    registry: JobRegistry,
    job_timeout: Duration,
}

enum Interrupted {
    Deadline,
    Cancelled,
}

impl JobSupervisor {
    pub fn new(registry: JobRegistry, job_timeout: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            registry,
            job_timeout,
        }
    }

    /// Token cancelled on [`JobSupervisor::shutdown`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of job tasks still running
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns the task driving `job_id`
    ///
    /// `work` receives a child cancellation token and returns the job in its
    /// final state.
    pub fn spawn<F, Fut>(&self, job_id: JobId, work: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Job>> + Send + 'static,
    {
        let token = self.cancel.child_token();
        let fut = work(token.clone());
        let registry = self.registry.clone();
        let deadline = self.job_timeout;

        self.tracker.spawn(async move {
            let interrupted = tokio::select! {
                biased;
                _ = token.cancelled() => Interrupted::Cancelled,
                _ = tokio::time::sleep(deadline) => Interrupted::Deadline,
                result = fut => {
                    if let Err(e) = result {
                        tracing::error!(job_id = %job_id, error = %e, "Job task ended with error");
                    }
                    return;
                }
            };

            let (kind, reason) = match interrupted {
                Interrupted::Deadline => (
                    FailureKind::Timeout,
                    format!("Job timed out after {}s", deadline.as_secs()),
                ),
                Interrupted::Cancelled => {
                    (FailureKind::Cancelled, "Job cancelled during shutdown".to_string())
                }
            };

            if let Err(e) = registry.fail_if_running(&job_id, kind, reason).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record interrupted job");
            }
        });
    }

    /// Waits until no job task is left, including tasks spawned while waiting
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Cancels every running job and waits for their tasks to record it
    pub async fn shutdown(&self) {
        tracing::info!(active = self.active(), "Shutting down job supervisor");
        self.cancel.cancel();
        self.wait().await;
    }
}
