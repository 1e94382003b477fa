//! Import command implementation
//!
//! Stages a finished export's NDJSON files and asks the destination to pull
//! them with `$import`. The files must be reachable by the destination under
//! `import.artifact_base_url`.

use super::{connect, exit_code_for, parse_job_id, report_final, wait_for_jobs};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// FINISHED export job whose artifacts are imported
    #[arg(long)]
    pub export_job_id: String,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let export_job_id = match parse_job_id(&self.export_job_id) {
            Ok(id) => id,
            Err(code) => return Ok(code),
        };
        let bridge = match connect(config_path).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let started = match bridge.start_import(&export_job_id).await {
            Ok(view) => view,
            Err(e) => {
                println!("❌ Import could not be started");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!(
            "📥 Import job {} started from export {export_job_id}",
            started.job_id
        );
        let interrupted = wait_for_jobs(&bridge, shutdown_signal).await;
        Ok(report_final(&bridge, &started.job_id, interrupted).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_parse_import() {
        let cli = Cli::parse_from(["fhirbridge", "import", "--export-job-id", "e-1"]);
        match cli.command {
            Commands::Import(args) => assert_eq!(args.export_job_id, "e-1"),
            other => panic!("expected import, got {other:?}"),
        }
    }
}
