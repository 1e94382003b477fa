//! Job registry: the store-backed record of every job
//!
//! Every write goes to the [`JobStore`] first and is mirrored into the
//! optional [`JobCache`] only after the store accepted it. Status reads go to
//! the store; when it is unreachable they fail with
//! [`BridgeError::StoreUnavailable`] instead of answering from the cache.
//!
//! A row left IN_PROGRESS past the job timeout (its task died with an earlier
//! process) is failed with `timeout` the next time it is read.

use super::cache::JobCache;
use crate::adapters::store::JobStore;
use crate::domain::{
    BridgeError, FailureKind, Job, JobId, JobKind, JobStatusView, Result,
};
use crate::log_job_transition;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// How a job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Finished(Option<serde_json::Value>),
    Failed(FailureKind, String),
}

impl JobOutcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed(kind, reason.into())
    }
}

/// A status read answered by the in-process cache
///
/// Only produced by [`JobRegistry::cached_status`]; the `authoritative`
/// flag is always false so callers cannot mistake it for store truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStatus {
    #[serde(flatten)]
    pub view: JobStatusView,
    pub authoritative: bool,
}

#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    cache: Option<Arc<JobCache>>,
    job_timeout: Option<Duration>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>, cache_enabled: bool) -> Self {
        Self {
            store,
            cache: cache_enabled.then(|| Arc::new(JobCache::new())),
            job_timeout: None,
        }
    }

    /// Fails IN_PROGRESS rows on read once they are older than `job_timeout`
    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = Some(job_timeout);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Persists a job row, then mirrors it into the cache
    ///
    /// Terminal jobs are evicted from the cache instead; the store row is
    /// their only record.
    pub async fn save(&self, job: &Job) -> Result<()> {
        self.store.save_job(job).await?;
        if let Some(cache) = &self.cache {
            if job.is_terminal() {
                cache.invalidate(&job.job_id).await;
            } else {
                cache.mirror(job).await;
            }
        }
        Ok(())
    }

    /// Persists a newly created IN_PROGRESS job
    pub async fn create(&self, job: &Job) -> Result<()> {
        self.save(job).await?;
        log_job_transition!(job);
        Ok(())
    }

    /// Applies the terminal transition to `job` and persists it
    pub async fn complete(&self, job: &mut Job, outcome: JobOutcome) -> Result<()> {
        match outcome {
            JobOutcome::Finished(summary) => job.finish(summary)?,
            JobOutcome::Failed(kind, reason) => job.fail(kind, reason)?,
        }
        self.save(job).await?;
        log_job_transition!(job);
        Ok(())
    }

    /// Marks a stored job FAILED unless it already reached a terminal state
    ///
    /// Returns the job as stored afterwards.
    pub async fn fail_if_running(
        &self,
        job_id: &JobId,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Result<Job> {
        let mut job = self.get(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }
        self.complete(&mut job, JobOutcome::Failed(kind, reason.into()))
            .await?;
        Ok(job)
    }

    /// Loads a job from the store
    pub async fn get(&self, job_id: &JobId) -> Result<Job> {
        let job = self.load(job_id).await?;
        self.expire_if_stale(job).await
    }

    async fn load(&self, job_id: &JobId) -> Result<Job> {
        self.store
            .load_job(job_id)
            .await?
            .ok_or_else(|| BridgeError::JobNotFound(job_id.to_string()))
    }

    /// Whether `job` is IN_PROGRESS and older than the job timeout
    fn is_stale(&self, job: &Job) -> bool {
        let Some(timeout) = self.job_timeout else {
            return false;
        };
        !job.is_terminal()
            && (Utc::now() - job.created_at)
                .to_std()
                .map(|age| age > timeout)
                .unwrap_or(false)
    }

    async fn expire_if_stale(&self, mut job: Job) -> Result<Job> {
        if !self.is_stale(&job) {
            return Ok(job);
        }
        let timeout = self.job_timeout.unwrap_or_default();
        tracing::warn!(
            job_id = %job.job_id,
            kind = %job.kind,
            created_at = %job.created_at.to_rfc3339(),
            "Job outlived its timeout without a running task"
        );
        let reason = format!("Job timed out after {}s", timeout.as_secs());
        match self
            .complete(&mut job, JobOutcome::Failed(FailureKind::Timeout, reason))
            .await
        {
            Ok(()) => Ok(job),
            // Another writer reached a terminal state first
            Err(BridgeError::JobTerminal { .. }) => self.load(&job.job_id).await,
            Err(e) => Err(e),
        }
    }

    /// Authoritative status read
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatusView> {
        self.get(job_id).await.map(|job| job.status_view())
    }

    /// Non-authoritative status read from the in-process cache
    pub async fn cached_status(&self, job_id: &JobId) -> Option<CachedStatus> {
        let cache = self.cache.as_ref()?;
        cache.get(job_id).await.map(|job| CachedStatus {
            view: job.status_view(),
            authoritative: false,
        })
    }

    /// All jobs of `kind` (or every job), oldest first
    pub async fn list(&self, kind: Option<JobKind>) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for job in self.store.list_jobs(kind).await? {
            jobs.push(self.expire_if_stale(job).await?);
        }
        Ok(jobs)
    }

    /// The most recently created job of `kind`
    pub async fn latest(&self, kind: JobKind) -> Result<Option<Job>> {
        let jobs = self.list(Some(kind)).await?;
        Ok(jobs.into_iter().max_by_key(|job| job.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::FileJobStore;
    use crate::domain::JobStatus;
    use async_trait::async_trait;
    use tempfile::TempDir;

    async fn registry(cache: bool) -> (TempDir, JobRegistry) {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path().join("jobs"));
        store.ensure_schema().await.unwrap();
        (dir, JobRegistry::new(Arc::new(store), cache))
    }

    /// Store that is always down
    struct DownStore;

    #[async_trait]
    impl JobStore for DownStore {
        fn backend_name(&self) -> &'static str {
            "down"
        }
        async fn ensure_schema(&self) -> Result<()> {
            Err(BridgeError::StoreUnavailable("down".into()))
        }
        async fn load_job(&self, _job_id: &JobId) -> Result<Option<Job>> {
            Err(BridgeError::StoreUnavailable("down".into()))
        }
        async fn save_job(&self, _job: &Job) -> Result<()> {
            Err(BridgeError::StoreUnavailable("down".into()))
        }
        async fn list_jobs(&self, _kind: Option<JobKind>) -> Result<Vec<Job>> {
            Err(BridgeError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_create_complete_status() {
        let (_dir, registry) = registry(true).await;
        let mut job = Job::new(JobId::new("r1").unwrap(), JobKind::Transaction);
        registry.create(&job).await.unwrap();

        job.record_resources_count(3).unwrap();
        registry
            .complete(&mut job, JobOutcome::Finished(None))
            .await
            .unwrap();

        let view = registry.status(&job.job_id).await.unwrap();
        assert_eq!(view.status, JobStatus::Finished);
        assert_eq!(view.resources_count, Some(3));
    }

    #[tokio::test]
    async fn test_terminal_job_cannot_transition_again() {
        let (_dir, registry) = registry(false).await;
        let mut job = Job::new(JobId::new("r2").unwrap(), JobKind::Export);
        registry.create(&job).await.unwrap();
        registry
            .complete(&mut job, JobOutcome::failed(FailureKind::Timeout, "late"))
            .await
            .unwrap();

        let err = registry
            .complete(&mut job, JobOutcome::Finished(None))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::JobTerminal { .. }));

        let stored = registry
            .fail_if_running(&job.job_id, FailureKind::Cancelled, "shutdown")
            .await
            .unwrap();
        assert_eq!(stored.failure_kind, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let (_dir, registry) = registry(true).await;
        let err = registry
            .status(&JobId::new("missing").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_store_down_is_distinct_from_failed() {
        let registry = JobRegistry::new(Arc::new(DownStore), true);
        let job = Job::new(JobId::new("r3").unwrap(), JobKind::Import);

        assert!(registry.create(&job).await.unwrap_err().is_store_unavailable());
        assert!(registry
            .status(&job.job_id)
            .await
            .unwrap_err()
            .is_store_unavailable());
        // A failed store write is never mirrored into the cache
        assert!(registry.cached_status(&job.job_id).await.is_none());
    }

    #[tokio::test]
    async fn test_cached_status_is_marked_non_authoritative() {
        let (_dir, registry) = registry(true).await;
        let job = Job::new(JobId::new("r4").unwrap(), JobKind::Export);
        registry.create(&job).await.unwrap();

        let cached = registry.cached_status(&job.job_id).await.unwrap();
        assert!(!cached.authoritative);
        assert_eq!(cached.view.status, JobStatus::InProgress);

        let (_dir2, uncached) = self::registry(false).await;
        assert!(uncached.cached_status(&job.job_id).await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_jobs_leave_the_cache() {
        let (_dir, registry) = registry(true).await;
        let mut job = Job::new(JobId::new("r5").unwrap(), JobKind::Transaction);
        registry.create(&job).await.unwrap();
        assert!(registry.cached_status(&job.job_id).await.is_some());

        registry
            .complete(&mut job, JobOutcome::Finished(None))
            .await
            .unwrap();
        assert!(registry.cached_status(&job.job_id).await.is_none());
        assert_eq!(
            registry.status(&job.job_id).await.unwrap().status,
            JobStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_orphaned_in_progress_row_reads_as_timed_out() {
        let (_dir, registry) = registry(true).await;
        let registry = registry.with_job_timeout(Duration::from_secs(60));

        let mut orphan = Job::new(JobId::new("orphan").unwrap(), JobKind::Export);
        orphan.created_at = Utc::now() - chrono::Duration::days(1);
        registry.create(&orphan).await.unwrap();
        let fresh = Job::new(JobId::new("fresh").unwrap(), JobKind::Export);
        registry.create(&fresh).await.unwrap();

        let view = registry.status(&orphan.job_id).await.unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("Job timed out after 60s"));

        let stored = registry.get(&orphan.job_id).await.unwrap();
        assert_eq!(stored.failure_kind, Some(FailureKind::Timeout));
        assert!(stored.finished_at.is_some());

        let listed = registry.list(Some(JobKind::Export)).await.unwrap();
        let fresh = listed.iter().find(|job| job.job_id.as_str() == "fresh").unwrap();
        assert_eq!(fresh.status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_stale_rows_are_expired_when_listed() {
        let (_dir, registry) = registry(false).await;
        let registry = registry.with_job_timeout(Duration::from_secs(60));

        let mut orphan = Job::new(JobId::new("listed").unwrap(), JobKind::Import);
        orphan.created_at = Utc::now() - chrono::Duration::hours(2);
        registry.create(&orphan).await.unwrap();

        let latest = registry.latest(JobKind::Import).await.unwrap().unwrap();
        assert_eq!(latest.status, JobStatus::Failed);
        assert_eq!(latest.failure_kind, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_latest_by_kind() {
        let (_dir, registry) = registry(false).await;
        let first = Job::new(JobId::new("old").unwrap(), JobKind::Import);
        registry.create(&first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = Job::new(JobId::new("new").unwrap(), JobKind::Import);
        registry.create(&second).await.unwrap();
        registry
            .create(&Job::new(JobId::new("exp").unwrap(), JobKind::Export))
            .await
            .unwrap();

        let latest = registry.latest(JobKind::Import).await.unwrap().unwrap();
        assert_eq!(latest.job_id.as_str(), "new");
        assert!(registry
            .latest(JobKind::Transaction)
            .await
            .unwrap()
            .is_none());
    }
}
