//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for fhirbridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// fhirbridge - FHIR bulk export and landing tool
#[derive(Parser, Debug)]
#[command(name = "fhirbridge")]
#[command(version, about, long_about = None)]
#[command(author = "fhirbridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "fhirbridge.toml", env = "FHIRBRIDGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FHIRBRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bulk export from the source registry, optionally landing the result
    Export(commands::export::ExportArgs),

    /// Land a finished export as one transaction bundle
    Transact(commands::transact::TransactArgs),

    /// Land a finished export with a destination-side bulk import
    Import(commands::import::ImportArgs),

    /// Show job status from the job store
    Status(commands::status::StatusArgs),

    /// List or print a job's NDJSON artifacts
    Artifacts(commands::artifacts::ArtifactsArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
