//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the fhirbridge configuration file.

use crate::config::{load_config, StoreBackend};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also validates every section
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Source: {}", config.source.base_url);
        println!("  Destination: {}", config.destination.base_url);
        println!("  Export Types: {}", config.export.resource_types.join(","));
        println!("  Automatic Landing: {:?}", config.export.land);
        println!(
            "  Export Polling: every {}s, at most {} attempts",
            config.export.poll_interval_seconds, config.export.max_poll_attempts
        );
        println!("  Artifacts: {}", config.artifacts.root_dir);
        match &config.import.artifact_base_url {
            Some(url) => println!("  Import Artifact URL: {url}"),
            None => println!("  Import Artifact URL: (not set, import landing disabled)"),
        }
        println!("  Job Timeout: {}s", config.jobs.job_timeout_seconds);

        match config.store.backend {
            StoreBackend::File => {
                println!("  Job Store: file ({})", config.store.path);
            }
            StoreBackend::PostgreSQL => {
                if let Some(pg) = &config.store.postgresql {
                    println!("  Job Store: PostgreSQL");
                    println!("  Connection: {}", pg.connection_string.expose_secret().masked());
                    println!("  Max Connections: {}", pg.max_connections);
                }
            }
        }
        println!();
        Ok(0)
    }
}
