//! Bounded polling of asynchronous bulk operations
//!
//! Export and import status locations are polled with the same loop. The
//! loop always terminates: on completion, on an upstream failure, after
//! `max_attempts` requests, after `max_wall_clock` elapsed, after too many
//! consecutive transport failures, or on cancellation.

use crate::adapters::fhir::{FhirClient, StatusResponse};
use crate::domain::{BridgeError, FailureKind};
use crate::log_poll_attempt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Limits for one poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between "still running" responses
    pub interval: Duration,
    /// Maximum number of status requests
    pub max_attempts: u32,
    /// Maximum time spent in the loop
    pub max_wall_clock: Duration,
}

/// How a poll loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The operation finished; the body of the final status response
    Complete(serde_json::Value),
    /// The server reported failure (non-200/202 status)
    Rejected {
        status: u16,
        diagnostics: Option<String>,
    },
    /// Attempts or wall-clock budget exhausted while still running
    TimedOut { attempts: u32, elapsed: Duration },
    /// Consecutive requests failed without any response
    Transport(String),
    /// The server answered 200 with a body that could not be parsed
    Invalid(String),
    /// The caller's cancellation token fired
    Cancelled,
}

impl PollOutcome {
    /// Failure kind and job error message for every outcome except `Complete`
    ///
    /// `operation` names the polled operation in the message ("Export", "Import").
    pub fn failure(&self, operation: &str) -> Option<(FailureKind, String)> {
        match self {
            PollOutcome::Complete(_) => None,
            PollOutcome::Rejected {
                status,
                diagnostics,
            } => {
                let mut reason = format!("{operation} failed with status {status}");
                if let Some(d) = diagnostics {
                    reason.push_str(": ");
                    reason.push_str(d);
                }
                Some((FailureKind::UpstreamRejected, reason))
            }
            PollOutcome::TimedOut { attempts, elapsed } => {
                tracing::warn!(
                    operation,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "Polling budget exhausted"
                );
                Some((
                    FailureKind::Timeout,
                    format!("{operation} polling timed out after maximum attempts"),
                ))
            }
            PollOutcome::Transport(e) => Some((FailureKind::Transport, e.clone())),
            PollOutcome::Invalid(e) => Some((
                FailureKind::UpstreamRejected,
                format!("Invalid {} status response: {e}", operation.to_lowercase()),
            )),
            PollOutcome::Cancelled => Some((
                FailureKind::Cancelled,
                format!("{operation} polling cancelled"),
            )),
        }
    }
}

/// Polls `url` until the operation leaves the running state or a bound is hit
pub async fn poll_until_done(
    client: &FhirClient,
    url: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> PollOutcome {
    let retry = client.retry_config();
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut transport_failures: usize = 0;

    loop {
        let elapsed = started.elapsed();
        if attempts >= policy.max_attempts || elapsed >= policy.max_wall_clock {
            return PollOutcome::TimedOut { attempts, elapsed };
        }

        attempts += 1;
        log_poll_attempt!(url, attempts, policy.max_attempts);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            response = client.poll_status(url) => response,
        };

        let delay = match response {
            Ok(StatusResponse::Running { progress }) => {
                transport_failures = 0;
                tracing::debug!(url = %url, progress = ?progress, "Operation still running");
                policy.interval
            }
            Ok(StatusResponse::Complete(body)) => return PollOutcome::Complete(body),
            Ok(StatusResponse::Failed {
                status,
                diagnostics,
            }) => {
                return PollOutcome::Rejected {
                    status,
                    diagnostics,
                }
            }
            Err(BridgeError::Fhir(e)) if e.is_transport() => {
                transport_failures += 1;
                if transport_failures > retry.max_retries {
                    return PollOutcome::Transport(e.to_string());
                }
                crate::log_retry_attempt!(transport_failures, retry.max_retries, e);
                retry.delay_for(transport_failures)
            }
            Err(e) => return PollOutcome::Invalid(e.to_string()),
        };

        let remaining = policy.max_wall_clock.saturating_sub(started.elapsed());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(delay.min(remaining)) => {}
        }
    }
}
