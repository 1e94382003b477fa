//! Status command implementation
//!
//! Reads job status from the job store. The in-process cache of a running
//! bridge is never consulted here.

use super::{connect, exit_code_for, parse_job_id, print_job};
use crate::domain::JobKind;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show a single job
    #[arg(long, conflicts_with_all = ["kind", "latest"])]
    pub job_id: Option<String>,

    /// Only jobs of this kind (export, transaction, import)
    #[arg(long)]
    pub kind: Option<JobKind>,

    /// Only the newest job of `--kind`
    #[arg(long, requires = "kind")]
    pub latest: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking job status");

        let bridge = match connect(config_path).await {
            Ok(b) => b,
            Err(code) => return Ok(code),
        };

        let views = if let Some(raw) = &self.job_id {
            let job_id = match parse_job_id(raw) {
                Ok(id) => id,
                Err(code) => return Ok(code),
            };
            bridge.status(&job_id).await.map(|view| vec![view])
        } else if let (true, Some(kind)) = (self.latest, self.kind) {
            bridge
                .latest(kind)
                .await
                .map(|view| view.into_iter().collect())
        } else {
            bridge.list(self.kind).await
        };

        let views = match views {
            Ok(v) => v,
            Err(e) => {
                println!("❌ Failed to read job status");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(0);
        }

        println!("📊 Job Status");
        println!();
        if views.is_empty() {
            println!("No jobs found.");
            println!();
            return Ok(0);
        }
        for view in &views {
            print_job(view);
            println!();
        }

        Ok(0)
    }
}
