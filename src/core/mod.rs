//! Core business logic for fhirbridge.
//!
//! # Modules
//!
//! - [`poll`] - bounded polling shared by export and import
//! - [`export`] - export kickoff, polling and manifest fetch
//! - [`transform`] - payload decoding, identifier rewriting, artifact files
//! - [`bundle`] - dependency-ordered transaction bundles
//! - [`landing`] - transaction and `$import` submission
//! - [`jobs`] - job registry, cache and task supervision
//! - [`coordinator`] - wires the above for callers
//!
//! # Pipeline
//!
//! 1. **Kickoff**: `$export` on the source registry returns a poll location
//! 2. **Poll**: bounded by attempts and wall-clock time
//! 3. **Fetch**: every manifest entry; failed entries are dropped and counted
//! 4. **Transform**: decode, rewrite identifiers, write per-type NDJSON
//! 5. **Land** (optional): one transaction bundle, or a destination `$import`
//!
//! # Example
//!
//! ```rust,no_run
//! use fhirbridge::config::load_config;
//! use fhirbridge::core::BridgeCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhirbridge.toml")?;
//! let bridge = BridgeCoordinator::new(config).await?;
//!
//! let job = bridge.start_export(None, None).await?;
//! println!("Export {} is {}", job.job_id, job.status);
//!
//! bridge.wait().await;
//! let done = bridge.status(&job.job_id).await?;
//! println!("Export {} is {}", done.job_id, done.status);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod coordinator;
pub mod export;
pub mod jobs;
pub mod landing;
pub mod poll;
pub mod transform;

pub use coordinator::BridgeCoordinator;
