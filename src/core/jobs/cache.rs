//! In-process mirror of recently written jobs
//!
//! Never authoritative: it is filled only after a successful store write and
//! is empty after a restart. Reads from it are labelled as cached. Only
//! IN_PROGRESS jobs are held; a job leaves the cache when it turns terminal.

use crate::domain::{Job, JobId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct JobCache {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors a job that was just persisted
    pub async fn mirror(&self, job: &Job) {
        self.jobs.write().await.insert(job.job_id.clone(), job.clone());
    }

    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn invalidate(&self, job_id: &JobId) {
        self.jobs.write().await.remove(job_id);
    }
}
