//! Domain error types
//!
//! This module defines the error hierarchy for fhirbridge. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main fhirbridge error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors raised while talking to a FHIR server
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// Validation errors (e.g. an empty transaction bundle)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The job store could not be reached or refused the operation
    ///
    /// This is deliberately distinct from a job being FAILED: the job's
    /// real state is unknown while the store is down.
    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    /// No job with the given identifier exists in the store
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A write was attempted against a job that already reached a terminal state
    #[error("Job {job_id} is already {status} and cannot be modified")]
    JobTerminal { job_id: String, status: String },

    /// Artifact namespace errors (reading/writing NDJSON files)
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// FHIR server errors
///
/// Errors that occur when interacting with the source registry or the
/// destination store. These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum FhirError {
    /// The export kickoff did not hand back a poll location
    #[error("Export kickoff failed: {message}{}", diagnostics_suffix(.diagnostics))]
    KickoffFailed {
        message: String,
        diagnostics: Option<String>,
    },

    /// No response was received (connect error, reset, client-side timeout)
    #[error("Failed to reach FHIR server: {0}")]
    ConnectionFailed(String),

    /// The server answered with a status that is not a success for the operation
    #[error("Server rejected request: {status}{}", diagnostics_suffix(.diagnostics))]
    Rejected {
        status: u16,
        diagnostics: Option<String>,
        body: String,
    },

    /// The server answered, but the body could not be understood
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

fn diagnostics_suffix(diagnostics: &Option<String>) -> String {
    match diagnostics {
        Some(d) => format!(" ({d})"),
        None => String::new(),
    }
}

impl FhirError {
    /// Whether the error happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, FhirError::ConnectionFailed(_))
    }
}

impl BridgeError {
    /// Whether this error means the job store could not be used
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, BridgeError::StoreUnavailable(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parse error: {err}"))
    }
}
