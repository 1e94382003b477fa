//! Bulk `$import` landing path
//!
//! The destination pulls the artifact files itself, so every file must be
//! reachable under `import.artifact_base_url`. Import artifacts are kept
//! after the job ends.

use super::landing_failure;
use crate::adapters::fhir::FhirClient;
use crate::config::ImportConfig;
use crate::core::jobs::{JobOutcome, JobRegistry};
use crate::core::poll::{poll_until_done, PollOutcome};
use crate::core::transform::ArtifactStore;
use crate::domain::{BridgeError, FailureKind, Job, JobId, Result};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ImportSubmitter {
    client: FhirClient,
    artifacts: ArtifactStore,
    registry: JobRegistry,
    config: ImportConfig,
}

impl ImportSubmitter {
    pub fn new(
        client: FhirClient,
        artifacts: ArtifactStore,
        registry: JobRegistry,
        config: ImportConfig,
    ) -> Self {
        Self {
            client,
            artifacts,
            registry,
            config,
        }
    }

    /// The `$import` kickoff body naming every artifact file of `job_id`
    pub fn build_parameters(&self, job_id: &JobId, files: &[String]) -> Result<Value> {
        let base = self
            .config
            .artifact_base_url
            .as_deref()
            .ok_or_else(|| {
                BridgeError::Validation("import.artifact_base_url is not configured".to_string())
            })?
            .trim_end_matches('/');

        let mut parameter = vec![
            json!({ "name": "inputFormat", "valueCode": self.config.input_format }),
            json!({
                "name": "storageDetail",
                "part": [
                    { "name": "type", "valueCode": "file" },
                    {
                        "name": "maxBatchResourceCount",
                        "valueString": self.config.max_batch_resource_count.to_string()
                    }
                ]
            }),
        ];

        for file in files {
            let Some(resource_type) = ArtifactStore::resource_type_of(file) else {
                continue;
            };
            parameter.push(json!({
                "name": "input",
                "part": [
                    { "name": "type", "valueCode": resource_type.as_str() },
                    { "name": "url", "valueUri": format!("{base}/{}/{file}", job_id.path_segment()) }
                ]
            }));
        }

        Ok(json!({ "resourceType": "Parameters", "parameter": parameter }))
    }

    /// Stages artifacts, kicks off the import and polls it to completion
    pub async fn run(&self, mut job: Job, cancel: CancellationToken) -> Result<Job> {
        let outcome = match self.land(&mut job, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_store_unavailable() => return Err(e),
            Err(e) => {
                let (kind, reason) = landing_failure(e);
                JobOutcome::Failed(kind, reason)
            }
        };

        self.registry.complete(&mut job, outcome).await?;
        Ok(job)
    }

    async fn land(&self, job: &mut Job, cancel: &CancellationToken) -> Result<JobOutcome> {
        let export_job_id = job.export_job_id.clone().ok_or_else(|| {
            BridgeError::Validation(format!("Import job {} has no export job", job.job_id))
        })?;

        let files = self
            .artifacts
            .copy_namespace(&export_job_id, &job.job_id)
            .await?;
        if files.is_empty() {
            return Ok(JobOutcome::failed(
                FailureKind::Validation,
                "No NDJSON files available for import",
            ));
        }

        let parameters = self.build_parameters(&job.job_id, &files)?;
        tracing::info!(job_id = %job.job_id, files = files.len(), url = %self.client.base_url(), "Requesting bulk import");
        let status_url = self.client.kickoff_import(&parameters).await?;

        job.record_status_url(status_url.clone())?;
        self.registry.save(job).await?;

        let outcome =
            poll_until_done(&self.client, &status_url, &self.config.poll_policy(), cancel).await;
        Ok(match outcome {
            PollOutcome::Complete(result) => JobOutcome::Finished(Some(json!({ "result": result }))),
            other => {
                let (kind, reason) = other
                    .failure("Import")
                    .unwrap_or((FailureKind::UpstreamRejected, "Import failed".to_string()));
                JobOutcome::Failed(kind, reason)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::{FileJobStore, JobStore};
    use crate::config::{FhirServerConfig, RetryConfig};
    use crate::domain::{JobKind, JobStatus};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        submitter: ImportSubmitter,
        artifacts: ArtifactStore,
        registry: JobRegistry,
    }

    async fn fixture(url: &str, max_attempts: u32) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path().join("jobs"));
        store.ensure_schema().await.unwrap();
        let registry = JobRegistry::new(Arc::new(store), false);
        let artifacts = ArtifactStore::new(dir.path().join("exports"));

        let mut server = FhirServerConfig::new(url);
        server.retry = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let config = ImportConfig {
            artifact_base_url: Some("https://files.example.org/exports/".to_string()),
            poll_interval_seconds: 0,
            max_poll_attempts: max_attempts,
            ..ImportConfig::default()
        };
        let submitter = ImportSubmitter::new(
            FhirClient::new(&server).unwrap(),
            artifacts.clone(),
            registry.clone(),
            config,
        );
        Fixture {
            _dir: dir,
            submitter,
            artifacts,
            registry,
        }
    }

    async fn import_job(fx: &Fixture) -> Job {
        let export_id = JobId::new("export-1").unwrap();
        let mut map = BTreeMap::new();
        map.insert(
            "Condition".to_string(),
            vec![json!({"resourceType": "Condition", "id": "1"})],
        );
        map.insert(
            "Patient".to_string(),
            vec![json!({"resourceType": "Patient", "id": "5"})],
        );
        fx.artifacts.write_artifacts(&export_id, &map).await.unwrap();

        let job = Job::landing(JobKind::Import, export_id);
        fx.registry.create(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_parameters_body() {
        let fx = fixture("http://127.0.0.1:1", 1).await;
        let job_id = JobId::new("imp-1").unwrap();
        let params = fx
            .submitter
            .build_parameters(
                &job_id,
                &["Condition.ndjson".to_string(), "Patient.ndjson".to_string()],
            )
            .unwrap();

        assert_eq!(params["resourceType"], "Parameters");
        let parameter = params["parameter"].as_array().unwrap();
        assert_eq!(parameter.len(), 4);
        assert_eq!(parameter[0]["valueCode"], "application/fhir+ndjson");
        assert_eq!(parameter[1]["part"][1]["valueString"], "500");
        assert_eq!(parameter[2]["part"][0]["valueCode"], "Condition");
        assert_eq!(
            parameter[3]["part"][1]["valueUri"],
            "https://files.example.org/exports/imp-1/Patient.ndjson"
        );
    }

    #[tokio::test]
    async fn test_import_completes_and_keeps_artifacts() {
        let mut server = mockito::Server::new_async().await;
        let kickoff = server
            .mock("POST", "/$import")
            .match_header("prefer", "respond-async")
            .with_status(202)
            .with_header("content-location", &format!("{}/import-status/1", server.url()))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/import-status/1")
            .with_status(200)
            .with_body(r#"{"resourceType":"OperationOutcome","issue":[]}"#)
            .create_async()
            .await;

        let fx = fixture(&server.url(), 5).await;
        let job = import_job(&fx).await;
        let job = fx
            .submitter
            .run(job, CancellationToken::new())
            .await
            .unwrap();

        kickoff.assert_async().await;
        assert_eq!(job.status, JobStatus::Finished);
        assert!(job.status_url.unwrap().ends_with("/import-status/1"));
        assert_eq!(
            job.result_summary.unwrap()["result"]["resourceType"],
            "OperationOutcome"
        );
        assert_eq!(fx.artifacts.list(&job.job_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_poll_exhaustion() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/$import")
            .with_status(202)
            .with_header("content-location", &format!("{}/import-status/2", server.url()))
            .create_async()
            .await;
        server
            .mock("GET", "/import-status/2")
            .with_status(202)
            .expect(3)
            .create_async()
            .await;

        let fx = fixture(&server.url(), 3).await;
        let job = import_job(&fx).await;
        let job = fx
            .submitter
            .run(job, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.failure_kind, Some(FailureKind::Timeout));
        assert_eq!(
            job.error.as_deref(),
            Some("Import polling timed out after maximum attempts")
        );
    }

    #[tokio::test]
    async fn test_kickoff_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/$import")
            .with_status(400)
            .with_body(r#"{"issue":[{"diagnostics":"$import disabled"}]}"#)
            .create_async()
            .await;

        let fx = fixture(&server.url(), 3).await;
        let job = import_job(&fx).await;
        let job = fx
            .submitter
            .run(job, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.failure_kind, Some(FailureKind::UpstreamRejected));
        assert!(job.error.unwrap().contains("$import disabled"));
    }

    #[tokio::test]
    async fn test_accepted_import_without_location_is_a_kickoff_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/$import")
            .with_status(202)
            .create_async()
            .await;

        let fx = fixture(&server.url(), 3).await;
        let job = import_job(&fx).await;
        let job = fx
            .submitter
            .run(job, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Kickoff));
        assert!(job.error.unwrap().contains("Content-Location"));
    }

    #[tokio::test]
    async fn test_no_artifacts_fails_validation() {
        let fx = fixture("http://127.0.0.1:1", 3).await;
        let job = Job::landing(JobKind::Import, JobId::new("empty-export").unwrap());
        fx.registry.create(&job).await.unwrap();

        let job = fx
            .submitter
            .run(job, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.failure_kind, Some(FailureKind::Validation));
        assert_eq!(
            job.error.as_deref(),
            Some("No NDJSON files available for import")
        );
    }
}
