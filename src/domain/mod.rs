//! Domain models and types for fhirbridge.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`JobId`], [`ResourceType`])
//! - **The job model** ([`Job`]) and its `IN_PROGRESS -> FINISHED | FAILED` state machine
//! - **Error types** ([`BridgeError`], [`FhirError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, BridgeError>`]:
//!
//! ```rust,no_run
//! use fhirbridge::domain::{BridgeError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = fhirbridge::config::load_config("fhirbridge.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod job;
pub mod result;

pub use errors::{BridgeError, FhirError};
pub use ids::{JobId, ResourceType};
pub use job::{FailureKind, Job, JobKind, JobStatus, JobStatusView, ManifestEntry};
pub use result::Result;
