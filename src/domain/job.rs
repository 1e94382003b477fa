//! Job domain model and lifecycle state machine
//!
//! Every unit of asynchronous work (an export, a transaction landing or an
//! import landing) is tracked as a [`Job`]. Jobs start `IN_PROGRESS` and move
//! exactly once to either `FINISHED` or `FAILED`; after that they are
//! read-only. All mutating methods enforce this and return
//! [`BridgeError::JobTerminal`] instead of overwriting a terminal job.

use super::errors::BridgeError;
use super::ids::JobId;
use super::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Export,
    Transaction,
    Import,
}

impl JobKind {
    /// Returns the kind as its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Export => "export",
            JobKind::Transaction => "transaction",
            JobKind::Import => "import",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "export" => Ok(JobKind::Export),
            "transaction" => Ok(JobKind::Transaction),
            "import" => Ok(JobKind::Import),
            other => Err(format!(
                "Invalid job kind '{other}'. Must be one of: export, transaction, import"
            )),
        }
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Finished,
    Failed,
}

impl JobStatus {
    /// Whether no further transition is allowed from this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }

    /// Returns the status as its wire string form
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended up FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The kickoff request did not yield a poll location
    Kickoff,
    /// No response was received from a remote server
    Transport,
    /// A remote server answered with a non-success status
    UpstreamRejected,
    /// Polling or the per-job deadline ran out
    Timeout,
    /// Nothing usable was produced (empty bundle, zero valid records)
    Validation,
    /// Artifact files could not be written or read
    Artifact,
    /// The job store refused a write mid-run
    Store,
    /// The task was cancelled during shutdown
    Cancelled,
}

/// One entry of an export manifest: where to fetch one resource type's data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "url")]
    pub source_url: String,
}

impl ManifestEntry {
    pub fn new(resource_type: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            source_url: source_url.into(),
        }
    }
}

/// A tracked unit of asynchronous work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<serde_json::Value>,

    /// Export jobs: the manifest once the registry reported completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Vec<ManifestEntry>>,
    /// Export jobs: the registry's poll location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,

    /// Landing jobs: the export job whose artifacts are being landed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_job_id: Option<JobId>,
    /// Import jobs: the destination's import status location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
    /// Transaction jobs: number of resources submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_count: Option<u64>,
}

impl Job {
    /// Creates a new IN_PROGRESS job
    pub fn new(job_id: JobId, kind: JobKind) -> Self {
        Self {
            job_id,
            kind,
            status: JobStatus::InProgress,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
            failure_kind: None,
            result_summary: None,
            manifest: None,
            poll_url: None,
            export_job_id: None,
            status_url: None,
            resources_count: None,
        }
    }

    /// Creates a new IN_PROGRESS landing job sourced from an export job
    pub fn landing(kind: JobKind, export_job_id: JobId) -> Self {
        let mut job = Self::new(JobId::generate(), kind);
        job.export_job_id = Some(export_job_id);
        job
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_in_progress(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(BridgeError::JobTerminal {
                job_id: self.job_id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Records the export manifest
    pub fn record_manifest(&mut self, manifest: Vec<ManifestEntry>) -> Result<()> {
        self.ensure_in_progress()?;
        self.manifest = Some(manifest);
        Ok(())
    }

    /// Records the destination's import status location
    pub fn record_status_url(&mut self, status_url: impl Into<String>) -> Result<()> {
        self.ensure_in_progress()?;
        self.status_url = Some(status_url.into());
        Ok(())
    }

    /// Records the number of resources submitted in a transaction
    pub fn record_resources_count(&mut self, count: u64) -> Result<()> {
        self.ensure_in_progress()?;
        self.resources_count = Some(count);
        Ok(())
    }

    /// Transitions IN_PROGRESS -> FINISHED
    pub fn finish(&mut self, summary: Option<serde_json::Value>) -> Result<()> {
        self.ensure_in_progress()?;
        self.status = JobStatus::Finished;
        self.finished_at = Some(Utc::now());
        self.result_summary = summary;
        Ok(())
    }

    /// Transitions IN_PROGRESS -> FAILED with a human-readable reason
    pub fn fail(&mut self, kind: FailureKind, reason: impl Into<String>) -> Result<()> {
        self.ensure_in_progress()?;
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.failure_kind = Some(kind);
        self.error = Some(reason.into());
        Ok(())
    }

    /// Whether `next` is a legal successor of this job's state
    ///
    /// Used by stores to refuse overwriting a terminal row with anything
    /// other than the identical terminal record.
    pub fn accepts_update(&self, next: &Job) -> bool {
        !self.is_terminal() || self == next
    }

    /// The public status view of this job
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.job_id.clone(),
            kind: self.kind,
            status: self.status,
            created_at: self.created_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
            resources_count: self.resources_count,
        }
    }
}

/// The status shape returned to callers reading job state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_count: Option<u64>,
}
