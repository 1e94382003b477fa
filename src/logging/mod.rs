//! Logging and observability
//!
//! Structured logging on top of `tracing`:
//! - console output, filtered by `RUST_LOG` or the configured level
//! - optional JSON file output with rotation
//! - helper macros for the events every job emits
//!
//! # Example
//!
//! ```no_run
//! use fhirbridge::logging::init_logging;
//! use fhirbridge::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(job_id = "abc123", "Export started");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log a job lifecycle transition
///
/// # Example
///
/// ```no_run
/// use fhirbridge::log_job_transition;
/// use fhirbridge::domain::{Job, JobId, JobKind};
///
/// let job = Job::new(JobId::new("abc123").unwrap(), JobKind::Export);
/// log_job_transition!(&job);
/// ```
#[macro_export]
macro_rules! log_job_transition {
    ($job:expr) => {
        match $job.status {
            $crate::domain::JobStatus::Failed => tracing::warn!(
                job_id = %$job.job_id,
                kind = %$job.kind,
                status = %$job.status,
                error = $job.error.as_deref().unwrap_or(""),
                "Job state changed"
            ),
            _ => tracing::info!(
                job_id = %$job.job_id,
                kind = %$job.kind,
                status = %$job.status,
                "Job state changed"
            ),
        }
    };
}

/// Log one status poll against a remote bulk operation
///
/// # Example
///
/// ```no_run
/// use fhirbridge::log_poll_attempt;
///
/// log_poll_attempt!("https://registry/poll?_jobId=abc", 3, 360);
/// ```
#[macro_export]
macro_rules! log_poll_attempt {
    ($url:expr, $attempt:expr, $max_attempts:expr) => {
        tracing::debug!(
            url = %$url,
            attempt = $attempt,
            max_attempts = $max_attempts,
            "Polling bulk operation status"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use fhirbridge::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection reset");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying request"
        );
    };
}
