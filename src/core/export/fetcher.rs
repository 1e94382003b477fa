//! Retrieval of the files named by an export manifest

use super::summary::DroppedEntry;
use crate::adapters::fhir::FhirClient;
use crate::domain::ManifestEntry;
use std::collections::BTreeMap;

/// Payloads fetched for one manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    /// Encoded payloads keyed by manifest entry type, in manifest order
    pub payloads: BTreeMap<String, Vec<String>>,
    pub fetched: usize,
    /// Entries whose fetch failed; they are excluded, not fatal
    pub dropped: Vec<DroppedEntry>,
}

#[derive(Clone)]
pub struct BinaryFetcher {
    client: FhirClient,
}

impl BinaryFetcher {
    pub fn new(client: FhirClient) -> Self {
        Self { client }
    }

    /// Fetches every manifest entry, dropping the ones that fail
    pub async fn fetch(&self, manifest: &[ManifestEntry]) -> FetchResult {
        let mut result = FetchResult::default();

        for entry in manifest {
            match self.client.fetch_binary(&entry.source_url).await {
                Ok(data) => {
                    result
                        .payloads
                        .entry(entry.resource_type.clone())
                        .or_default()
                        .push(data);
                    result.fetched += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        resource_type = %entry.resource_type,
                        url = %entry.source_url,
                        error = %e,
                        "Dropping manifest entry after fetch failure"
                    );
                    result.dropped.push(DroppedEntry::new(entry, e.to_string()));
                }
            }
        }

        tracing::info!(
            fetched = result.fetched,
            dropped = result.dropped.len(),
            "Manifest fetch complete"
        );
        result
    }
}
