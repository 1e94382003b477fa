//! Artifacts command implementation
//!
//! Lists the NDJSON files in a job's artifact namespace, or prints one of them.

use super::{exit_code_for, load, parse_job_id};
use crate::core::transform::ArtifactStore;
use clap::Args;

/// Arguments for the artifacts command
#[derive(Args, Debug)]
pub struct ArtifactsArgs {
    /// Job whose namespace is read
    #[arg(long)]
    pub job_id: String,

    /// Print this file (e.g. `Patient.ndjson`) instead of listing
    #[arg(long)]
    pub file: Option<String>,
}

impl ArtifactsArgs {
    /// Execute the artifacts command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let job_id = match parse_job_id(&self.job_id) {
            Ok(id) => id,
            Err(code) => return Ok(code),
        };
        let store = ArtifactStore::new(&config.artifacts.root_dir);

        if let Some(file) = &self.file {
            return match store.read(&job_id, file).await {
                Ok(content) => {
                    println!("{content}");
                    Ok(0)
                }
                Err(e) => {
                    println!("❌ Failed to read {file}");
                    println!("   Error: {e}");
                    Ok(exit_code_for(&e))
                }
            };
        }

        let files = match store.list(&job_id).await {
            Ok(files) => files,
            Err(e) => {
                println!("❌ Failed to list artifacts");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🗂  Artifacts for job {job_id}");
        println!("  Directory: {}", store.namespace(&job_id).display());
        if files.is_empty() {
            println!("  (none)");
        }
        for file in &files {
            println!("  - {file}");
        }
        Ok(0)
    }
}
