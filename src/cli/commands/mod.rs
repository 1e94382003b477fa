//! CLI command implementations
//!
//! Exit codes shared by every command: 0 success, 1 the job FAILED,
//! 2 configuration or request validation error, 4 the job store or a FHIR
//! server could not be reached, 5 any other error, 130 interrupted.

pub mod artifacts;
pub mod export;
pub mod import;
pub mod status;
pub mod transact;
pub mod validate;

use crate::config::{load_config, BridgeConfig};
use crate::core::BridgeCoordinator;
use crate::domain::{BridgeError, FhirError, JobId, JobStatus, JobStatusView};
use tokio::sync::watch;

/// Loads the configuration file, printing the failure for the user
pub(crate) fn load(config_path: &str) -> Result<BridgeConfig, i32> {
    load_config(config_path).map_err(|e| {
        println!("❌ Failed to load configuration file");
        println!("   Error: {e}");
        2
    })
}

/// Loads the configuration and builds the coordinator on its job store
pub(crate) async fn connect(config_path: &str) -> Result<BridgeCoordinator, i32> {
    let config = load(config_path)?;
    BridgeCoordinator::new(config).await.map_err(|e| {
        println!("❌ Failed to open job store");
        println!("   Error: {e}");
        exit_code_for(&e)
    })
}

pub(crate) fn parse_job_id(raw: &str) -> Result<JobId, i32> {
    JobId::new(raw).map_err(|e| {
        println!("❌ Invalid job id: {e}");
        2
    })
}

/// Maps an error that prevented a job from starting to a process exit code
pub(crate) fn exit_code_for(err: &BridgeError) -> i32 {
    match err {
        BridgeError::Configuration(_) | BridgeError::Validation(_) => 2,
        BridgeError::JobNotFound(_) => 2,
        BridgeError::StoreUnavailable(_) => 4,
        BridgeError::Fhir(FhirError::ConnectionFailed(_)) => 4,
        _ => 5,
    }
}

/// Waits until every started job is terminal
///
/// Returns `true` when a shutdown signal arrived first; running jobs are
/// then cancelled and recorded as FAILED before this returns.
pub(crate) async fn wait_for_jobs(
    bridge: &BridgeCoordinator,
    mut shutdown_signal: watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = bridge.wait() => false,
        _ = shutdown_signal.wait_for(|stop| *stop) => {
            tracing::info!(active = bridge.active_jobs(), "Cancelling running jobs");
            bridge.shutdown().await;
            true
        }
    }
}

pub(crate) fn print_job(view: &JobStatusView) {
    let icon = match view.status {
        JobStatus::InProgress => "⏳",
        JobStatus::Finished => "✅",
        JobStatus::Failed => "❌",
    };
    println!("{icon} {} job {}", view.kind, view.job_id);
    println!("  Status: {}", view.status);
    println!("  Created: {}", view.created_at.to_rfc3339());
    if let Some(finished_at) = view.finished_at {
        println!("  Finished: {}", finished_at.to_rfc3339());
    }
    if let Some(count) = view.resources_count {
        println!("  Resources: {count}");
    }
    if let Some(error) = &view.error {
        println!("  Error: {error}");
    }
}

/// Prints the final state of a job and turns it into an exit code
pub(crate) async fn report_final(
    bridge: &BridgeCoordinator,
    job_id: &JobId,
    interrupted: bool,
) -> i32 {
    let view = match bridge.status(job_id).await {
        Ok(view) => view,
        Err(e) => {
            println!("❌ Failed to read job status");
            println!("   Error: {e}");
            return exit_code_for(&e);
        }
    };

    println!();
    print_job(&view);
    println!();

    if interrupted {
        println!("⚠️  Interrupted. Running jobs were marked FAILED.");
        return 130;
    }
    match view.status {
        JobStatus::Finished => 0,
        _ => 1,
    }
}
