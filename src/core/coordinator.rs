//! Bridge coordinator - entry point for starting and inspecting jobs
//!
//! Owns the job registry and supervisor and wires the export manager and
//! both landing submitters to them. Every `start_*` call returns as soon as
//! the job row exists; the work itself runs as a supervised task.

use crate::adapters::fhir::FhirClient;
use crate::adapters::store::{create_job_store, JobStore};
use crate::config::{BridgeConfig, LandStrategy};
use crate::core::export::ExportJobManager;
use crate::core::jobs::{CachedStatus, JobRegistry, JobSupervisor};
use crate::core::landing::{landing_failure, ImportSubmitter, TransactionSubmitter};
use crate::core::transform::{ArtifactStore, TransformEngine};
use crate::domain::{BridgeError, Job, JobId, JobKind, JobStatus, JobStatusView, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct BridgeCoordinator {
    config: BridgeConfig,
    registry: JobRegistry,
    supervisor: JobSupervisor,
    artifacts: ArtifactStore,
    exports: ExportJobManager,
    transactions: TransactionSubmitter,
    imports: ImportSubmitter,
}

impl BridgeCoordinator {
    /// Builds the coordinator with the configured job store
    pub async fn new(config: BridgeConfig) -> Result<Self> {
        let store = create_job_store(&config.store).await?;
        Self::with_store(config, store)
    }

    /// Builds the coordinator on an existing job store
    pub fn with_store(config: BridgeConfig, store: Arc<dyn JobStore>) -> Result<Self> {
        let registry = JobRegistry::new(store, config.jobs.cache_enabled)
            .with_job_timeout(config.jobs.job_timeout());
        let supervisor = JobSupervisor::new(registry.clone(), config.jobs.job_timeout());
        let artifacts = ArtifactStore::new(&config.artifacts.root_dir);

        let source = FhirClient::new(&config.source)?;
        let destination = FhirClient::new(&config.destination)?;

        let exports = ExportJobManager::new(
            source,
            TransformEngine::new(config.transform.id_prefix.clone(), artifacts.clone()),
            registry.clone(),
            config.export.poll_policy(),
            config.export.resource_types.clone(),
        );
        let transactions =
            TransactionSubmitter::new(destination.clone(), artifacts.clone(), registry.clone());
        let imports = ImportSubmitter::new(
            destination,
            artifacts.clone(),
            registry.clone(),
            config.import.clone(),
        );

        tracing::debug!(
            store = registry.backend_name(),
            artifacts = %artifacts.root().display(),
            "Bridge coordinator ready"
        );

        Ok(Self {
            config,
            registry,
            supervisor,
            artifacts,
            exports,
            transactions,
            imports,
        })
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// The landing an export started with `requested` will trigger
    pub fn land_strategy(&self, requested: Option<LandStrategy>) -> LandStrategy {
        requested.unwrap_or(self.config.export.land)
    }

    /// Kicks off an export and polls it in the background
    ///
    /// `land` overrides `export.land`; when the export finishes, the chosen
    /// landing job is started from it.
    pub async fn start_export(
        &self,
        resource_types: Option<Vec<String>>,
        land: Option<LandStrategy>,
    ) -> Result<JobStatusView> {
        let land = self.land_strategy(land);
        if land == LandStrategy::Import {
            self.require_import_target()?;
        }

        let job = self.exports.start_export(resource_types).await?;
        let view = job.status_view();

        let this = self.clone();
        self.supervisor
            .spawn(job.job_id.clone(), move |cancel| async move {
                let job = this.exports.poll_and_store(job, cancel).await?;
                if job.status == JobStatus::Finished {
                    this.land_export(&job.job_id, land).await;
                }
                Ok(job)
            });

        Ok(view)
    }

    /// Starts a transaction landing job from a FINISHED export
    pub async fn start_transaction(&self, export_job_id: &JobId) -> Result<JobStatusView> {
        self.finished_export(export_job_id).await?;

        let job = Job::landing(JobKind::Transaction, export_job_id.clone());
        self.registry.create(&job).await?;
        let view = job.status_view();

        let transactions = self.transactions.clone();
        self.supervisor
            .spawn(job.job_id.clone(), move |_cancel| async move {
                transactions.run(job).await
            });

        Ok(view)
    }

    /// Starts an import landing job from a FINISHED export
    pub async fn start_import(&self, export_job_id: &JobId) -> Result<JobStatusView> {
        self.require_import_target()?;
        self.finished_export(export_job_id).await?;

        let job = Job::landing(JobKind::Import, export_job_id.clone());
        self.registry.create(&job).await?;
        let view = job.status_view();

        let imports = self.imports.clone();
        self.supervisor
            .spawn(job.job_id.clone(), move |cancel| async move {
                imports.run(job, cancel).await
            });

        Ok(view)
    }

    /// Authoritative job status
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatusView> {
        self.registry.status(job_id).await
    }

    /// Non-authoritative status from the in-process cache
    pub async fn cached_status(&self, job_id: &JobId) -> Option<CachedStatus> {
        self.registry.cached_status(job_id).await
    }

    pub async fn list(&self, kind: Option<JobKind>) -> Result<Vec<JobStatusView>> {
        let jobs = self.registry.list(kind).await?;
        Ok(jobs.iter().map(Job::status_view).collect())
    }

    pub async fn latest(&self, kind: JobKind) -> Result<Option<JobStatusView>> {
        Ok(self
            .registry
            .latest(kind)
            .await?
            .map(|job| job.status_view()))
    }

    /// Number of job tasks still running
    pub fn active_jobs(&self) -> usize {
        self.supervisor.active()
    }

    /// Waits for every running job, including landings they start
    pub async fn wait(&self) {
        self.supervisor.wait().await;
    }

    /// Cancels every running job and waits until each recorded its failure
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Starts the configured landing for a FINISHED export
    ///
    /// When the landing cannot start, a FAILED landing job is recorded in
    /// its place so the export never looks landed while nothing was sent.
    async fn land_export(&self, export_job_id: &JobId, land: LandStrategy) {
        let (kind, started) = match land {
            LandStrategy::None => return,
            LandStrategy::Transaction => (
                JobKind::Transaction,
                self.start_transaction(export_job_id).await,
            ),
            LandStrategy::Import => (JobKind::Import, self.start_import(export_job_id).await),
        };
        let err = match started {
            Ok(view) => {
                tracing::info!(
                    export_job_id = %export_job_id,
                    job_id = %view.job_id,
                    kind = %view.kind,
                    "Automatic landing started"
                );
                return;
            }
            Err(e) => e,
        };

        tracing::error!(
            export_job_id = %export_job_id,
            kind = %kind,
            error = %err,
            "Automatic landing could not start"
        );

        let (failure, reason) = landing_failure(err);
        let mut job = Job::landing(kind, export_job_id.clone());
        let recorded = match job.fail(failure, format!("Automatic landing could not start: {reason}")) {
            Ok(()) => self.registry.create(&job).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            tracing::error!(
                export_job_id = %export_job_id,
                error = %e,
                "Failed to record the landing that could not start"
            );
        }
    }

    async fn finished_export(&self, export_job_id: &JobId) -> Result<Job> {
        let job = match self.registry.get(export_job_id).await {
            Ok(job) => job,
            Err(BridgeError::JobNotFound(_)) => {
                return Err(BridgeError::Validation(format!(
                    "Export job {export_job_id} does not exist"
                )))
            }
            Err(e) => return Err(e),
        };

        if job.kind != JobKind::Export {
            return Err(BridgeError::Validation(format!(
                "Job {export_job_id} is a {} job, not an export",
                job.kind
            )));
        }
        if job.status != JobStatus::Finished {
            return Err(BridgeError::Validation(format!(
                "Export job {export_job_id} is {}, not FINISHED",
                job.status
            )));
        }
        Ok(job)
    }

    fn require_import_target(&self) -> Result<()> {
        if self.config.import.artifact_base_url.is_none() {
            return Err(BridgeError::Validation(
                "import.artifact_base_url must be configured to land via $import".to_string(),
            ));
        }
        Ok(())
    }
}
