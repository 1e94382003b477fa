// fhirbridge - FHIR bulk export, transform and landing tool
// Copyright (c) 2025 fhirbridge Contributors
// Licensed under the MIT License

//! # fhirbridge - FHIR bulk interchange
//!
//! fhirbridge moves batches of clinical resources from a source registry that
//! supports the FHIR bulk `$export` operation into a destination FHIR store.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Exporting** from the source registry with bounded asynchronous polling
//! - **Transforming** exported NDJSON by rewriting identifiers and references
//! - **Landing** the result as one dependency-ordered transaction bundle, or
//!   with a destination-side `$import`
//! - **Tracking** every export and landing as a job in a persistent store
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (polling, export, transform, bundle, landing, jobs)
//! - [`adapters`] - External integrations (FHIR servers, job store)
//! - [`domain`] - Job model, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhirbridge::config::{load_config, LandStrategy};
//! use fhirbridge::core::BridgeCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("fhirbridge.toml")?;
//!     let bridge = BridgeCoordinator::new(config).await?;
//!
//!     // Export Patient and Condition, then land them as a transaction
//!     let types = vec!["Patient".to_string(), "Condition".to_string()];
//!     let export = bridge
//!         .start_export(Some(types), Some(LandStrategy::Transaction))
//!         .await?;
//!
//!     bridge.wait().await;
//!     println!("{:?}", bridge.status(&export.job_id).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Identifier rewriting
//!
//! Relative `Type/number` references, and bare numbers under an `id` or
//! `reference` key, get the configured prefix:
//!
//! ```rust
//! use fhirbridge::core::transform::IdentifierRewrite;
//! use serde_json::json;
//!
//! let rule = IdentifierRewrite::new("ABC");
//! let mut record = json!({
//!     "resourceType": "Condition",
//!     "id": "77",
//!     "subject": {"reference": "Patient/5"}
//! });
//! rule.apply(&mut record);
//!
//! assert_eq!(record["id"], "ABC-77");
//! assert_eq!(record["subject"]["reference"], "Patient/ABC-5");
//! ```
//!
//! ## Error Handling
//!
//! All library errors are [`domain::BridgeError`]. A job store outage is
//! reported as `BridgeError::StoreUnavailable` and never as a FAILED job.
//!
//! ## Logging
//!
//! fhirbridge uses structured logging with the `tracing` crate; see
//! [`logging::init_logging`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
