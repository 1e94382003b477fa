//! Transaction landing path

use super::landing_failure;
use crate::adapters::fhir::FhirClient;
use crate::core::bundle::BundleBuilder;
use crate::core::jobs::{JobOutcome, JobRegistry};
use crate::core::transform::ArtifactStore;
use crate::domain::{BridgeError, FailureKind, FhirError, Job, Result};
use serde_json::json;

#[derive(Clone)]
pub struct TransactionSubmitter {
    client: FhirClient,
    builder: BundleBuilder,
    artifacts: ArtifactStore,
    registry: JobRegistry,
}

impl TransactionSubmitter {
    pub fn new(client: FhirClient, artifacts: ArtifactStore, registry: JobRegistry) -> Self {
        Self {
            client,
            builder: BundleBuilder::new(artifacts.clone()),
            artifacts,
            registry,
        }
    }

    /// Stages, builds and submits the bundle, then finalizes `job`
    ///
    /// On success the job's artifact namespace is deleted.
    pub async fn run(&self, mut job: Job) -> Result<Job> {
        let outcome = match self.submit(&mut job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let (kind, reason) = landing_failure(e);
                JobOutcome::Failed(kind, reason)
            }
        };

        let finished = matches!(outcome, JobOutcome::Finished(_));
        self.registry.complete(&mut job, outcome).await?;

        if finished {
            if let Err(e) = self.artifacts.delete(&job.job_id).await {
                tracing::warn!(job_id = %job.job_id, error = %e, "Failed to delete transaction artifacts");
            }
        }
        Ok(job)
    }

    async fn submit(&self, job: &mut Job) -> Result<JobOutcome> {
        let export_job_id = job.export_job_id.clone().ok_or_else(|| {
            BridgeError::Validation(format!("Transaction job {} has no export job", job.job_id))
        })?;

        self.artifacts
            .copy_namespace(&export_job_id, &job.job_id)
            .await?;
        let bundle = self.builder.build(&job.job_id).await?;
        let count = bundle.len() as u64;

        tracing::info!(job_id = %job.job_id, entries = count, url = %self.client.base_url(), "Submitting transaction bundle");
        match self.client.post_transaction(&bundle).await {
            Ok(response) => {
                job.record_resources_count(count)?;
                Ok(JobOutcome::Finished(Some(json!({ "response": response }))))
            }
            Err(BridgeError::Fhir(FhirError::Rejected {
                status,
                diagnostics,
                body,
            })) => {
                // Keep the destination's answer on the failed job for audit
                job.result_summary = Some(json!({ "status": status, "body": body }));
                let mut reason = format!("Transaction rejected with status {status}");
                if let Some(d) = diagnostics {
                    reason.push_str(": ");
                    reason.push_str(&d);
                }
                Ok(JobOutcome::failed(FailureKind::UpstreamRejected, reason))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::{FileJobStore, JobStore};
    use crate::config::{FhirServerConfig, RetryConfig};
    use crate::domain::{JobId, JobKind, JobStatus};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        submitter: TransactionSubmitter,
        artifacts: ArtifactStore,
        registry: JobRegistry,
    }

    async fn fixture(url: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path().join("jobs"));
        store.ensure_schema().await.unwrap();
        let registry = JobRegistry::new(Arc::new(store), false);
        let artifacts = ArtifactStore::new(dir.path().join("exports"));

        let mut config = FhirServerConfig::new(url);
        config.retry = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let submitter = TransactionSubmitter::new(
            FhirClient::new(&config).unwrap(),
            artifacts.clone(),
            registry.clone(),
        );
        Fixture {
            _dir: dir,
            submitter,
            artifacts,
            registry,
        }
    }

    async fn export_with(fx: &Fixture, records: Vec<Value>) -> JobId {
        let export_id = JobId::new("export-1").unwrap();
        let mut map = BTreeMap::new();
        if !records.is_empty() {
            map.insert("Condition".to_string(), records);
        }
        fx.artifacts.write_artifacts(&export_id, &map).await.unwrap();
        export_id
    }

    async fn landing_job(fx: &Fixture, export_id: JobId) -> Job {
        let job = Job::landing(JobKind::Transaction, export_id);
        fx.registry.create(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_empty_bundle_fails_before_network() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let fx = fixture(&server.url()).await;
        let export_id = export_with(&fx, vec![]).await;
        let job = landing_job(&fx, export_id).await;

        let job = fx.submitter.run(job).await.unwrap();

        post.assert_async().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn test_success_records_count_and_deletes_namespace() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/")
            .match_header("content-type", "application/fhir+json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "resourceType": "Bundle",
                "type": "transaction"
            })))
            .with_status(200)
            .with_body(r#"{"resourceType":"Bundle","type":"transaction-response"}"#)
            .expect(1)
            .create_async()
            .await;

        let fx = fixture(&server.url()).await;
        let export_id = export_with(
            &fx,
            vec![
                serde_json::json!({"resourceType": "Condition", "id": "1"}),
                serde_json::json!({"resourceType": "Condition", "id": "2"}),
            ],
        )
        .await;
        let job = landing_job(&fx, export_id.clone()).await;

        let job = fx.submitter.run(job).await.unwrap();

        post.assert_async().await;
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(job.resources_count, Some(2));
        assert_eq!(
            job.result_summary.unwrap()["response"]["type"],
            "transaction-response"
        );
        assert!(fx.artifacts.list(&job.job_id).await.unwrap().is_empty());
        // The export's own artifacts are untouched
        assert_eq!(fx.artifacts.list(&export_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_keeps_destination_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"resourceType":"OperationOutcome","issue":[{"diagnostics":"Invalid reference"}]}"#)
            .create_async()
            .await;

        let fx = fixture(&server.url()).await;
        let export_id = export_with(
            &fx,
            vec![serde_json::json!({"resourceType": "Condition", "id": "1"})],
        )
        .await;
        let job = landing_job(&fx, export_id).await;

        let job = fx.submitter.run(job).await.unwrap();

        assert_eq!(job.failure_kind, Some(FailureKind::UpstreamRejected));
        assert!(job.error.as_deref().unwrap().contains("Invalid reference"));
        assert_eq!(job.result_summary.as_ref().unwrap()["status"], 400);
        // Failed jobs keep their artifacts
        assert_eq!(fx.artifacts.list(&job.job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_destination_is_transport_failure() {
        let fx = fixture("http://127.0.0.1:1").await;
        let export_id = export_with(
            &fx,
            vec![serde_json::json!({"resourceType": "Condition", "id": "1"})],
        )
        .await;
        let job = landing_job(&fx, export_id).await;

        let job = fx.submitter.run(job).await.unwrap();
        assert_eq!(job.failure_kind, Some(FailureKind::Transport));
    }
}
