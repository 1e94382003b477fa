//! Export job manager
//!
//! Kicks off a bulk `$export` on the source registry, then drives the job
//! through polling, manifest fetch and transform to a terminal state.

use super::fetcher::BinaryFetcher;
use super::summary::ExportSummary;
use crate::adapters::fhir::{ExportManifest, FhirClient};
use crate::core::jobs::{JobOutcome, JobRegistry};
use crate::core::poll::{poll_until_done, PollOutcome, PollPolicy};
use crate::core::transform::TransformEngine;
use crate::domain::{BridgeError, FailureKind, FhirError, Job, JobId, JobKind, Result};
use regex::Regex;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

/// Extracts the registry's job token from a poll URL
///
/// Looks for `_jobId=<token>`; when absent the whole URL is the identifier.
pub fn extract_job_id(poll_url: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[?&]_jobId=([\w-]+)").unwrap());
    re.captures(poll_url)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| poll_url.to_string())
}

#[derive(Clone)]
pub struct ExportJobManager {
    client: FhirClient,
    fetcher: BinaryFetcher,
    engine: TransformEngine,
    registry: JobRegistry,
    policy: PollPolicy,
    default_types: Vec<String>,
}

impl ExportJobManager {
    pub fn new(
        client: FhirClient,
        engine: TransformEngine,
        registry: JobRegistry,
        policy: PollPolicy,
        default_types: Vec<String>,
    ) -> Self {
        Self {
            fetcher: BinaryFetcher::new(client.clone()),
            client,
            engine,
            registry,
            policy,
            default_types,
        }
    }

    /// Requests an export and records the new IN_PROGRESS job
    ///
    /// `resource_types` falls back to the configured defaults when `None` or
    /// empty.
    ///
    /// # Errors
    ///
    /// A kickoff failure (no poll location) is returned to the caller and no
    /// job is recorded. A store failure after a successful kickoff is
    /// returned as [`BridgeError::StoreUnavailable`].
    pub async fn start_export(&self, resource_types: Option<Vec<String>>) -> Result<Job> {
        let types = match resource_types {
            Some(types) if !types.is_empty() => types,
            _ => self.default_types.clone(),
        };

        let poll_url = self.client.kickoff_export(&types).await?;
        let job_id = JobId::new(extract_job_id(&poll_url)).map_err(|e| {
            BridgeError::from(FhirError::KickoffFailed {
                message: format!("unusable poll location {poll_url}: {e}"),
                diagnostics: None,
            })
        })?;

        let mut job = Job::new(job_id, JobKind::Export);
        job.poll_url = Some(poll_url);
        self.registry.create(&job).await?;

        tracing::info!(job_id = %job.job_id, types = %types.join(","), "Export started");
        Ok(job)
    }

    /// Polls the export to completion and finalizes the job
    ///
    /// Returns the job in its terminal state.
    pub async fn poll_and_store(&self, mut job: Job, cancel: CancellationToken) -> Result<Job> {
        let poll_url = job.poll_url.clone().ok_or_else(|| {
            BridgeError::Validation(format!("Export job {} has no poll URL", job.job_id))
        })?;

        let outcome = poll_until_done(&self.client, &poll_url, &self.policy, &cancel).await;
        let result = match outcome {
            PollOutcome::Complete(body) => self.collect(&mut job, body).await?,
            other => {
                let (kind, reason) = other
                    .failure("Export")
                    .unwrap_or((FailureKind::UpstreamRejected, "Export failed".to_string()));
                JobOutcome::Failed(kind, reason)
            }
        };

        self.registry.complete(&mut job, result).await?;
        Ok(job)
    }

    /// Manifest handling: fetch every entry, then transform into artifacts
    async fn collect(&self, job: &mut Job, body: serde_json::Value) -> Result<JobOutcome> {
        let manifest: ExportManifest = match serde_json::from_value(body) {
            Ok(manifest) => manifest,
            Err(e) => {
                return Ok(JobOutcome::failed(
                    FailureKind::Validation,
                    format!("Export manifest could not be parsed: {e}"),
                ))
            }
        };

        job.record_manifest(manifest.output.clone())?;
        self.registry.save(job).await?;

        let fetched = self.fetcher.fetch(&manifest.output).await;
        let report = match self.engine.process(&job.job_id, &fetched.payloads).await {
            Ok(report) => report,
            Err(e) => return Ok(JobOutcome::failed(FailureKind::Artifact, e.to_string())),
        };

        let summary = ExportSummary {
            manifest_entries: manifest.output.len(),
            binaries_fetched: fetched.fetched,
            dropped_entries: fetched.dropped,
            transform: report,
        };

        if !manifest.output.is_empty() && summary.transform.records == 0 {
            return Ok(JobOutcome::failed(
                FailureKind::Validation,
                format!(
                    "No valid records in {} manifest entries ({} dropped)",
                    summary.manifest_entries,
                    summary.dropped_entries.len()
                ),
            ));
        }

        if summary.is_partial() {
            tracing::warn!(
                job_id = %job.job_id,
                dropped = summary.dropped_entries.len(),
                "Export finished with partial result"
            );
        }
        Ok(JobOutcome::Finished(Some(summary.to_value())))
    }
}
