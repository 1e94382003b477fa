//! Transact command implementation

use super::{connect, exit_code_for, parse_job_id, report_final, wait_for_jobs};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the transact command
#[derive(Args, Debug)]
pub struct TransactArgs {
    /// FINISHED export job whose artifacts are submitted as one transaction bundle
    #[arg(long)]
    pub export_job_id: String,
}

impl TransactArgs {
    /// Execute the transact command
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

        let started = match bridge.start_transaction(&export_job_id).await {
            Ok(view) => view,
            Err(e) => {
                println!("❌ Transaction could not be started");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!(
            "📦 Transaction job {} started from export {export_job_id}",
            started.job_id
        );
        let interrupted = wait_for_jobs(&bridge, shutdown_signal).await;
        Ok(report_final(&bridge, &started.job_id, interrupted).await)
    }
}
