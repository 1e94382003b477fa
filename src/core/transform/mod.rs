//! Record transformation
//!
//! Turns the encoded payloads fetched from an export manifest into per-type
//! NDJSON artifacts:
//!
//! - [`decode`] - base64 NDJSON payloads into JSON records
//! - [`rewrite`] - identifier/reference de-identification as a JSON visitor
//! - [`artifacts`] - job-scoped artifact namespaces on disk

pub mod artifacts;
pub mod decode;
pub mod rewrite;

pub use artifacts::ArtifactStore;
pub use decode::{decode_payload, parse_ndjson, DecodedPayload};
pub use rewrite::{is_identifier_key, walk, IdentifierRewrite, StringRule};

use crate::domain::{JobId, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of transforming one job's payloads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    /// Artifact files written, in resource type order
    pub files: Vec<String>,
    pub records: usize,
    pub skipped_lines: usize,
    /// Payloads that were not valid base64/UTF-8 and were dropped whole
    pub undecodable_payloads: usize,
    pub rewritten_values: usize,
}

/// Decodes, rewrites and writes artifacts for one job
#[derive(Debug, Clone)]
pub struct TransformEngine {
    rule: IdentifierRewrite,
    artifacts: ArtifactStore,
}

impl TransformEngine {
    pub fn new(id_prefix: impl Into<String>, artifacts: ArtifactStore) -> Self {
        Self {
            rule: IdentifierRewrite::new(id_prefix),
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Decodes and rewrites payloads, grouping records by resource type
    ///
    /// `payloads` is keyed by the manifest entry type. A record is filed
    /// under its own `resourceType` when it has one, otherwise under the
    /// manifest type it came from.
    pub fn transform_payloads(
        &self,
        payloads: &BTreeMap<String, Vec<String>>,
    ) -> (BTreeMap<String, Vec<Value>>, TransformReport) {
        let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut report = TransformReport::default();

        for (manifest_type, encoded) in payloads {
            for payload in encoded {
                let decoded = match decode_payload(payload) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::warn!(resource_type = %manifest_type, error = %e, "Dropping undecodable payload");
                        report.undecodable_payloads += 1;
                        continue;
                    }
                };
                report.skipped_lines += decoded.skipped_lines;

                for mut record in decoded.records {
                    report.rewritten_values += self.rule.apply(&mut record);
                    let type_name = record
                        .get("resourceType")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .unwrap_or(manifest_type)
                        .to_string();
                    grouped.entry(type_name).or_default().push(record);
                    report.records += 1;
                }
            }
        }

        (grouped, report)
    }

    /// Transforms `payloads` and writes the artifacts of `job_id`
    pub async fn process(
        &self,
        job_id: &JobId,
        payloads: &BTreeMap<String, Vec<String>>,
    ) -> Result<TransformReport> {
        let (grouped, mut report) = self.transform_payloads(payloads);
        report.files = self.artifacts.write_artifacts(job_id, &grouped).await?;

        tracing::info!(
            job_id = %job_id,
            files = report.files.len(),
            records = report.records,
            skipped_lines = report.skipped_lines,
            "Transform complete"
        );
        Ok(report)
    }
}
