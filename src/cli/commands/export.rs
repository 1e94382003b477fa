//! Export command implementation
//!
//! Kicks off a bulk export on the source registry, waits for it to become
//! terminal and, with `--land`, for the landing job started from it.

use super::{connect, exit_code_for, print_job, report_final, wait_for_jobs};
use crate::config::LandStrategy;
use crate::domain::{JobKind, JobStatus, JobStatusView};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Resource types to export (comma-separated, overrides export.resource_types)
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Landing to start once the export finishes (none, transaction, import)
    #[arg(long)]
    pub land: Option<LandStrategy>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let bridge = match connect(config_path).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let types = self.types.clone().filter(|t| !t.is_empty());
        tracing::info!(types = ?types, land = ?self.land, "Starting export");

        let started = match bridge.start_export(types, self.land).await {
            Ok(view) => view,
            Err(e) => {
                tracing::error!(error = %e, "Export kickoff failed");
                println!("❌ Export could not be started");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Export job {} started", started.job_id);
        let interrupted = wait_for_jobs(&bridge, shutdown_signal).await;
        let code = report_final(&bridge, &started.job_id, interrupted).await;
        if code != 0 {
            return Ok(code);
        }

        // Landing jobs started from this export
        let mut landings = Vec::new();
        for kind in [JobKind::Transaction, JobKind::Import] {
            match bridge.registry().list(Some(kind)).await {
                Ok(jobs) => landings.extend(
                    jobs.iter()
                        .filter(|job| job.export_job_id.as_ref() == Some(&started.job_id))
                        .map(|job| job.status_view()),
                ),
                Err(e) => {
                    println!("❌ Failed to read landing jobs");
                    println!("   Error: {e}");
                    return Ok(exit_code_for(&e));
                }
            }
        }
        for view in &landings {
            print_job(view);
            println!();
        }

        Ok(landing_exit_code(bridge.land_strategy(self.land), &landings))
    }
}

/// Exit code once the export FINISHED, from the landing jobs started from it
///
/// A requested landing that left no job behind is a failure.
fn landing_exit_code(land: LandStrategy, landings: &[JobStatusView]) -> i32 {
    if land != LandStrategy::None && landings.is_empty() {
        println!("❌ A {land:?} landing was requested but no landing job was recorded");
        return 1;
    }
    if landings.iter().any(|view| view.status == JobStatus::Failed) {
        1
    } else {
        0
    }
}
