//! Domain identifier types with validation
//!
//! Newtype wrappers that keep job identifiers and FHIR resource type names
//! from being mixed with arbitrary strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job identifier newtype wrapper
///
/// For export jobs this is the identifier the source registry handed back in
/// its `Content-Location` header. Landing jobs get a locally generated UUID.
///
/// # Examples
///
/// ```
/// use fhirbridge::domain::ids::JobId;
/// use std::str::FromStr;
///
/// let job_id = JobId::from_str("4f1c2b7e-0d39-4c0a-9d3e-0a4b2e6d8f11").unwrap();
/// assert_eq!(job_id.as_str(), "4f1c2b7e-0d39-4c0a-9d3e-0a4b2e6d8f11");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new JobId from a string
    ///
    /// Any non-blank string is accepted (a registry that hands back no
    /// `_jobId` token is identified by its whole poll URL). Use
    /// [`JobId::path_segment`] wherever the id names a file or directory.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Job ID cannot be empty".to_string());
        }
        if id == "." || id == ".." {
            return Err(format!("Job ID is not a valid name: {id}"));
        }
        Ok(Self(id))
    }

    /// The id percent-encoded so it is safe as a single path segment
    pub fn path_segment(&self) -> String {
        url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect()
    }

    /// Generates a fresh random job id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the job ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// FHIR resource type name (e.g. `Patient`, `Immunization`)
///
/// Must start with an uppercase ASCII letter and contain only ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Creates a new ResourceType, validating the name shape
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => {
                return Err(format!(
                    "Resource type must start with an uppercase letter: '{name}'"
                ))
            }
        }
        if !chars.all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("Resource type must be alphabetic: '{name}'"));
        }
        Ok(Self(name))
    }

    /// Returns the type name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ResourceType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_valid() {
        let id = JobId::new("abc-123").unwrap();
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");
    }

    #[test]
    fn test_job_id_empty() {
        assert!(JobId::new("").is_err());
        assert!(JobId::new("   ").is_err());
    }

    #[test]
    fn test_job_id_dot_names_rejected() {
        assert!(JobId::new(".").is_err());
        assert!(JobId::new("..").is_err());
    }

    #[test]
    fn test_path_segment_encodes_separators() {
        let id = JobId::new("https://x/poll?_jobId").unwrap();
        let segment = id.path_segment();
        assert!(!segment.contains('/'));
        assert!(!segment.contains('?'));
        assert_eq!(JobId::new("abc-123").unwrap().path_segment(), "abc-123");
        assert_eq!(JobId::new("../etc").unwrap().path_segment(), "..%2Fetc");
    }

    #[test]
    fn test_job_id_generate_is_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn test_job_id_serializes_as_plain_string() {
        let id = JobId::new("job-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-1\"");
    }

    #[test]
    fn test_resource_type_validation() {
        assert!(ResourceType::new("Immunization").is_ok());
        assert!(ResourceType::new("patient").is_err());
        assert!(ResourceType::new("Patient1").is_err());
        assert!(ResourceType::new("").is_err());
    }
}
