//! FHIR server integration
//!
//! [`FhirClient`] speaks the subset of FHIR REST used by the bridge:
//! bulk `$export` kickoff and status polling, manifest file download,
//! transaction bundle submission and `$import` kickoff.

pub mod client;
pub mod models;

pub use client::FhirClient;
pub use models::{extract_diagnostics, BinaryPayload, ExportManifest, StatusResponse};
