//! Transaction bundle construction from a job's artifacts

use super::priority::priority;
use crate::core::transform::rewrite::{is_absolute_identity, walk, StringRule};
use crate::core::transform::{parse_ndjson, ArtifactStore};
use crate::domain::{BridgeError, JobId, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Bundles above this size are still submitted, with a warning
pub const LARGE_BUNDLE_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Value,
    pub request: BundleRequest,
}

impl BundleEntry {
    pub fn resource_type(&self) -> &str {
        &self.request.url
    }
}

/// A FHIR `Bundle` of type `transaction`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: String,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn transaction(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: "transaction".to_string(),
            entry,
        }
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

/// `<Type>/<id>` with a FHIR id
fn local_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][A-Za-z]*)/([A-Za-z0-9\-.]{1,64})$").unwrap())
}

/// Points `reference` fields at bundle-local identities
///
/// Only references to a record present in the same bundle are rewritten;
/// anything else keeps its relative form for the destination to resolve.
struct BundleLocalReferences<'a> {
    members: &'a HashSet<(String, String)>,
}

impl StringRule for BundleLocalReferences<'_> {
    fn rewrite(&self, key: Option<&str>, value: &str) -> Option<String> {
        if key != Some("reference") || is_absolute_identity(value) {
            return None;
        }
        let caps = local_reference_regex().captures(value)?;
        let member = (caps[1].to_string(), caps[2].to_string());
        self.members
            .contains(&member)
            .then(|| format!("urn:uuid:{}", member.1))
    }
}

/// Builds one transaction bundle from every artifact of a job
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    artifacts: ArtifactStore,
}

impl BundleBuilder {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self { artifacts }
    }

    /// Reads, rewrites and orders every record of `job_id`
    ///
    /// # Errors
    ///
    /// [`BridgeError::Validation`] when no record yields an entry;
    /// [`BridgeError::Artifact`] when an artifact cannot be read.
    pub async fn build(&self, job_id: &JobId) -> Result<Bundle> {
        let mut resources = Vec::new();
        let mut skipped = 0usize;

        for file in self.artifacts.list(job_id).await? {
            let decoded = parse_ndjson(&self.artifacts.read(job_id, &file).await?);
            skipped += decoded.skipped_lines;

            for (index, record) in decoded.records.into_iter().enumerate() {
                match identity(&record) {
                    Some((resource_type, id)) => resources.push((resource_type, id, record)),
                    None => {
                        tracing::warn!(
                            job_id = %job_id,
                            file = %file,
                            line = index + 1,
                            "Skipping record without resourceType or id"
                        );
                        skipped += 1;
                    }
                }
            }
        }

        let members: HashSet<(String, String)> = resources
            .iter()
            .map(|(rt, id, _)| (rt.clone(), id.clone()))
            .collect();
        let rule = BundleLocalReferences { members: &members };

        let mut entries: Vec<BundleEntry> = resources
            .into_iter()
            .map(|(resource_type, id, mut resource)| {
                walk(&mut resource, &rule);
                BundleEntry {
                    full_url: format!("urn:uuid:{id}"),
                    resource,
                    request: BundleRequest {
                        method: "POST".to_string(),
                        url: resource_type,
                    },
                }
            })
            .collect();

        // Stable: equal priorities keep file read order
        entries.sort_by_key(|entry| priority(entry.resource_type()));

        if entries.is_empty() {
            return Err(BridgeError::Validation(format!(
                "Bundle has no entries for job {job_id} ({skipped} records skipped)"
            )));
        }
        if entries.len() > LARGE_BUNDLE_ENTRIES {
            tracing::warn!(
                job_id = %job_id,
                entries = entries.len(),
                "Large transaction bundle"
            );
        }

        tracing::info!(job_id = %job_id, entries = entries.len(), skipped, "Transaction bundle built");
        Ok(Bundle::transaction(entries))
    }
}

fn identity(record: &Value) -> Option<(String, String)> {
    let non_empty = |field: &str| {
        record
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    Some((non_empty("resourceType")?, non_empty("id")?))
}
