//! Landing exported data on the destination server
//!
//! - [`TransactionSubmitter`] - one atomic transaction bundle
//! - [`ImportSubmitter`] - destination-side `$import` of the artifact files
//!
//! Both work on a copy of the export's artifacts staged into the landing
//! job's own namespace.

pub mod import;
pub mod transaction;

pub use import::ImportSubmitter;
pub use transaction::TransactionSubmitter;

use crate::domain::{BridgeError, FailureKind, FhirError};

/// Classifies an error raised while landing into a job failure
pub(crate) fn landing_failure(err: BridgeError) -> (FailureKind, String) {
    let kind = match &err {
        BridgeError::Validation(_) | BridgeError::Configuration(_) => FailureKind::Validation,
        BridgeError::Artifact(_) | BridgeError::Io(_) | BridgeError::Serialization(_) => {
            FailureKind::Artifact
        }
        BridgeError::Fhir(FhirError::KickoffFailed { .. }) => FailureKind::Kickoff,
        BridgeError::Fhir(FhirError::ConnectionFailed(_)) => FailureKind::Transport,
        BridgeError::Fhir(FhirError::Rejected { .. } | FhirError::InvalidResponse(_)) => {
            FailureKind::UpstreamRejected
        }
        BridgeError::StoreUnavailable(_)
        | BridgeError::JobNotFound(_)
        | BridgeError::JobTerminal { .. } => FailureKind::Store,
    };
    (kind, err.to_string())
}
