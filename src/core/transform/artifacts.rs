//! Job-scoped NDJSON artifact files
//!
//! Every job owns one directory under the artifact root, named after its
//! (path-encoded) job id. Files inside are `<ResourceType>.ndjson`.

use crate::domain::{BridgeError, JobId, ResourceType, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ARTIFACT_EXTENSION: &str = "ndjson";

/// Filesystem store for per-job artifact namespaces
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of `job_id`
    pub fn namespace(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.path_segment())
    }

    /// File name for one resource type
    pub fn file_name(resource_type: &ResourceType) -> String {
        format!("{resource_type}.{ARTIFACT_EXTENSION}")
    }

    /// Resource type named by an artifact file, if the name is well formed
    pub fn resource_type_of(file_name: &str) -> Option<ResourceType> {
        let stem = file_name.strip_suffix(".ndjson")?;
        ResourceType::new(stem).ok()
    }

    /// Writes one NDJSON file per resource type and returns the names written
    ///
    /// Types with no records produce no file. Type names that are not valid
    /// FHIR resource type names are skipped with a warning.
    pub async fn write_artifacts(
        &self,
        job_id: &JobId,
        records_by_type: &BTreeMap<String, Vec<Value>>,
    ) -> Result<Vec<String>> {
        let dir = self.namespace(job_id);
        let mut written = Vec::new();

        for (type_name, records) in records_by_type {
            if records.is_empty() {
                continue;
            }
            let resource_type = match ResourceType::new(type_name.as_str()) {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Skipping records with invalid resource type");
                    continue;
                }
            };

            if written.is_empty() {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| artifact_error(&dir, e))?;
            }

            let lines = records
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let file_name = Self::file_name(&resource_type);
            let path = dir.join(&file_name);
            tokio::fs::write(&path, lines.join("\n"))
                .await
                .map_err(|e| artifact_error(&path, e))?;

            tracing::debug!(
                job_id = %job_id,
                resource_type = %resource_type,
                records = records.len(),
                "Artifact written"
            );
            written.push(file_name);
        }

        Ok(written)
    }

    /// Sorted artifact file names for `job_id`; empty if the namespace does not exist
    pub async fn list(&self, job_id: &JobId) -> Result<Vec<String>> {
        let dir = self.namespace(job_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(artifact_error(&dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| artifact_error(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::resource_type_of(&name).is_some() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Reads one artifact file
    pub async fn read(&self, job_id: &JobId, file_name: &str) -> Result<String> {
        if Self::resource_type_of(file_name).is_none() {
            return Err(BridgeError::Artifact(format!(
                "Not an artifact file name: {file_name}"
            )));
        }
        let path = self.namespace(job_id).join(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| artifact_error(&path, e))
    }

    /// Removes the whole namespace of `job_id`; a missing namespace is not an error
    pub async fn delete(&self, job_id: &JobId) -> Result<()> {
        let dir = self.namespace(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "Artifact namespace deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(artifact_error(&dir, e)),
        }
    }

    /// Copies every artifact of `from` into the namespace of `to`
    ///
    /// Returns the copied file names. Landing jobs work on their own copy so
    /// that deleting a transaction namespace never touches the export's files.
    pub async fn copy_namespace(&self, from: &JobId, to: &JobId) -> Result<Vec<String>> {
        let names = self.list(from).await?;
        if names.is_empty() {
            return Ok(names);
        }

        let source = self.namespace(from);
        let target = self.namespace(to);
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| artifact_error(&target, e))?;

        for name in &names {
            let dest = target.join(name);
            tokio::fs::copy(source.join(name), &dest)
                .await
                .map_err(|e| artifact_error(&dest, e))?;
        }

        Ok(names)
    }
}

fn artifact_error(path: &Path, err: std::io::Error) -> BridgeError {
    BridgeError::Artifact(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn job(id: &str) -> JobId {
        JobId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut records = BTreeMap::new();
        records.insert(
            "Condition".to_string(),
            vec![json!({"id": "1"}), json!({"id": "2"})],
        );
        records.insert("Immunization".to_string(), vec![]);

        let written = store.write_artifacts(&job("j1"), &records).await.unwrap();
        assert_eq!(written, vec!["Condition.ndjson".to_string()]);

        let content = store.read(&job("j1"), "Condition.ndjson").await.unwrap();
        assert_eq!(content, "{\"id\":\"1\"}\n{\"id\":\"2\"}");
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut a = BTreeMap::new();
        a.insert("Patient".to_string(), vec![json!({"id": "a"})]);
        let mut b = BTreeMap::new();
        b.insert("Patient".to_string(), vec![json!({"id": "b"})]);

        store.write_artifacts(&job("a"), &a).await.unwrap();
        store.write_artifacts(&job("b"), &b).await.unwrap();

        assert_eq!(
            store.read(&job("a"), "Patient.ndjson").await.unwrap(),
            "{\"id\":\"a\"}"
        );
        assert_eq!(
            store.read(&job("b"), "Patient.ndjson").await.unwrap(),
            "{\"id\":\"b\"}"
        );
    }

    #[tokio::test]
    async fn test_nothing_written_creates_no_namespace() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut records = BTreeMap::new();
        records.insert("lowercase".to_string(), vec![json!({"id": "1"})]);
        let written = store.write_artifacts(&job("j"), &records).await.unwrap();

        assert!(written.is_empty());
        assert!(!store.namespace(&job("j")).exists());
    }

    #[tokio::test]
    async fn test_list_sorted_and_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.list(&job("none")).await.unwrap().is_empty());

        let mut records = BTreeMap::new();
        records.insert("Patient".to_string(), vec![json!({})]);
        records.insert("Condition".to_string(), vec![json!({})]);
        store.write_artifacts(&job("j"), &records).await.unwrap();
        std::fs::write(store.namespace(&job("j")).join("notes.txt"), "x").unwrap();

        assert_eq!(
            store.list(&job("j")).await.unwrap(),
            vec!["Condition.ndjson".to_string(), "Patient.ndjson".to_string()]
        );
    }

    #[tokio::test]
    async fn test_copy_and_delete_namespace() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let mut records = BTreeMap::new();
        records.insert("Condition".to_string(), vec![json!({"id": "1"})]);
        store.write_artifacts(&job("export"), &records).await.unwrap();

        let copied = store
            .copy_namespace(&job("export"), &job("tx"))
            .await
            .unwrap();
        assert_eq!(copied, vec!["Condition.ndjson".to_string()]);

        store.delete(&job("tx")).await.unwrap();
        store.delete(&job("tx")).await.unwrap();
        assert!(store.list(&job("tx")).await.unwrap().is_empty());
        assert_eq!(store.list(&job("export")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_rejects_non_artifact_names() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.read(&job("j"), "../secrets.ndjson").await.unwrap_err();
        assert!(matches!(err, BridgeError::Artifact(_)));
    }

    #[test]
    fn test_resource_type_of() {
        assert_eq!(
            ArtifactStore::resource_type_of("Patient.ndjson").unwrap().as_str(),
            "Patient"
        );
        assert!(ArtifactStore::resource_type_of("Patient.json").is_none());
    }
}
