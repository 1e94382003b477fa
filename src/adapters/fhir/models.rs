//! Wire models for the FHIR bulk data and transaction endpoints

use crate::domain::ManifestEntry;
use serde::{Deserialize, Serialize};

/// Body of a completed `$export` status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    #[serde(default)]
    pub transaction_time: Option<String>,
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub output: Vec<ManifestEntry>,
    #[serde(default)]
    pub error: Vec<ManifestEntry>,
}

/// Body returned when fetching one manifest output file
#[derive(Debug, Clone, Deserialize)]
pub struct BinaryPayload {
    /// base64 of newline-delimited JSON
    pub data: String,
}

/// Outcome of one status poll against a bulk operation
#[derive(Debug, Clone, PartialEq)]
pub enum StatusResponse {
    /// 202: the operation is still running
    Running { progress: Option<String> },
    /// 200: finished; the body is a manifest (export) or an opaque result (import)
    Complete(serde_json::Value),
    /// Anything else: the operation failed upstream
    Failed {
        status: u16,
        diagnostics: Option<String>,
    },
}

/// Extracts `issue[0].diagnostics` from an OperationOutcome body, if present
pub fn extract_diagnostics(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("issue")?
        .get(0)?
        .get("diagnostics")?
        .as_str()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_diagnostics() {
        let body = r#"{"resourceType":"OperationOutcome","issue":[{"severity":"error","diagnostics":"Unknown type Foo"}]}"#;
        assert_eq!(extract_diagnostics(body).as_deref(), Some("Unknown type Foo"));
    }

    #[test]
    fn test_extract_diagnostics_absent() {
        assert_eq!(extract_diagnostics("not json"), None);
        assert_eq!(extract_diagnostics(r#"{"issue":[]}"#), None);
        assert_eq!(extract_diagnostics(r#"{"issue":[{"severity":"error"}]}"#), None);
    }

    #[test]
    fn test_manifest_tolerates_missing_fields() {
        let manifest: ExportManifest = serde_json::from_str(
            r#"{"output":[{"type":"Condition","url":"https://x/bin1","count":3}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.output.len(), 1);
        assert!(manifest.error.is_empty());
    }
}
