//! Filesystem job store
//!
//! Stores each job as `<dir>/<jobId>.json`. Writes go to a temporary file in
//! the same directory and are renamed into place, so a reader never sees a
//! half-written record.

use super::traits::{check_overwrite, JobStore};
use crate::domain::{BridgeError, Job, JobId, JobKind, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct FileJobStore {
    dir: PathBuf,
    // Serializes read-check-write in save_job within this process
    write_lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn job_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id.path_segment()))
    }

    async fn read_job(path: &Path) -> Result<Option<Job>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                BridgeError::StoreUnavailable(format!(
                    "Corrupt job record {}: {e}",
                    path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(path, e)),
        }
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> BridgeError {
    BridgeError::StoreUnavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl JobStore for FileJobStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn ensure_schema(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, e))
    }

    async fn load_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        Self::read_job(&self.job_path(job_id)).await
    }

    async fn save_job(&self, job: &Job) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.job_path(&job.job_id);

        let current = Self::read_job(&path).await?;
        check_overwrite(current.as_ref(), job)?;

        let bytes = serde_json::to_vec_pretty(job)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", job.job_id.path_segment()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| unavailable(&path, e))?;

        tracing::debug!(job_id = %job.job_id, status = %job.status, "Job record saved");
        Ok(())
    }

    async fn list_jobs(&self, kind: Option<JobKind>) -> Result<Vec<Job>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| unavailable(&self.dir, e))?;

        let mut jobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(&self.dir, e))?
        {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            if let Some(job) = Self::read_job(&path).await? {
                if kind.map_or(true, |k| job.kind == k) {
                    jobs.push(job);
                }
            }
        }

        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use tempfile::TempDir;

    async fn store() -> (TempDir, FileJobStore) {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path().join("jobs"));
        store.ensure_schema().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (_dir, store) = store().await;
        let job = Job::new(JobId::new("abc123").unwrap(), JobKind::Export);
        store.save_job(&job).await.unwrap();

        let loaded = store.load_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn test_load_missing_job() {
        let (_dir, store) = store().await;
        let missing = store.load_job(&JobId::new("nope").unwrap()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_terminal_row_is_not_overwritten() {
        let (_dir, store) = store().await;
        let mut job = Job::new(JobId::new("t1").unwrap(), JobKind::Transaction);
        store.save_job(&job).await.unwrap();

        job.finish(None).unwrap();
        store.save_job(&job).await.unwrap();
        // Re-saving the identical terminal record is harmless
        store.save_job(&job).await.unwrap();

        let mut stale = Job::new(JobId::new("t1").unwrap(), JobKind::Transaction);
        stale.fail(FailureKind::Transport, "late").unwrap();
        let err = store.save_job(&stale).await.unwrap_err();
        assert!(matches!(err, BridgeError::JobTerminal { .. }));

        let stored = store.load_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, crate::domain::JobStatus::Finished);
    }

    #[tokio::test]
    async fn test_list_jobs_filters_by_kind() {
        let (_dir, store) = store().await;
        store
            .save_job(&Job::new(JobId::new("e1").unwrap(), JobKind::Export))
            .await
            .unwrap();
        store
            .save_job(&Job::new(JobId::new("i1").unwrap(), JobKind::Import))
            .await
            .unwrap();

        assert_eq!(store.list_jobs(None).await.unwrap().len(), 2);
        let imports = store.list_jobs(Some(JobKind::Import)).await.unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].job_id.as_str(), "i1");
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_store_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = FileJobStore::new(blocker.join("jobs"));
        let err = store.ensure_schema().await.unwrap_err();
        assert!(err.is_store_unavailable());

        let err = store.list_jobs(None).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
