//! Export result summary
//!
//! Stored as the `resultSummary` of a FINISHED export job.

use crate::core::transform::TransformReport;
use crate::domain::ManifestEntry;
use serde::{Deserialize, Serialize};

/// A manifest entry that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedEntry {
    pub resource_type: String,
    pub url: String,
    pub reason: String,
}

impl DroppedEntry {
    pub fn new(entry: &ManifestEntry, reason: impl Into<String>) -> Self {
        Self {
            resource_type: entry.resource_type.clone(),
            url: entry.source_url.clone(),
            reason: reason.into(),
        }
    }
}

/// Summary of one export job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub manifest_entries: usize,
    pub binaries_fetched: usize,
    pub dropped_entries: Vec<DroppedEntry>,
    pub transform: TransformReport,
}

impl ExportSummary {
    /// Whether some manifest entries were dropped
    pub fn is_partial(&self) -> bool {
        !self.dropped_entries.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "manifestEntries": self.manifest_entries,
            "binariesFetched": self.binaries_fetched,
            "droppedCount": self.dropped_entries.len(),
            "droppedEntries": self.dropped_entries,
            "partial": self.is_partial(),
            "files": self.transform.files,
            "records": self.transform.records,
            "skippedLines": self.transform.skipped_lines,
            "undecodablePayloads": self.transform.undecodable_payloads,
        })
    }
}
