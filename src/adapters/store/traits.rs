//! Job store abstraction
//!
//! The job store is the single source of truth for job state. Backends must
//! make `save_job` a single-row upsert keyed by job id that never replaces a
//! terminal (FINISHED/FAILED) row with a different record.

use crate::domain::{Job, JobId, JobKind, Result};
use async_trait::async_trait;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Creates whatever the backend needs (directory, table) if missing
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::BridgeError::StoreUnavailable`] if the backend
    /// cannot be reached.
    async fn ensure_schema(&self) -> Result<()>;

    /// Loads one job
    ///
    /// Returns `Ok(None)` if no job with this id was ever saved.
    async fn load_job(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Inserts or updates one job
    ///
    /// # Errors
    ///
    /// [`crate::domain::BridgeError::JobTerminal`] if the stored row is
    /// already terminal and differs from `job`;
    /// [`crate::domain::BridgeError::StoreUnavailable`] on backend failure.
    async fn save_job(&self, job: &Job) -> Result<()>;

    /// Lists jobs, optionally of one kind, oldest first
    async fn list_jobs(&self, kind: Option<JobKind>) -> Result<Vec<Job>>;
}

/// Decides whether `next` may replace `current` in the store
pub(crate) fn check_overwrite(current: Option<&Job>, next: &Job) -> Result<()> {
    match current {
        Some(current) if !current.accepts_update(next) => {
            Err(crate::domain::BridgeError::JobTerminal {
                job_id: current.job_id.to_string(),
                status: current.status.to_string(),
            })
        }
        _ => Ok(()),
    }
}
