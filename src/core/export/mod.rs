//! Bulk export from the source registry
//!
//! - [`ExportJobManager`] - kickoff, bounded polling and job finalization
//! - [`BinaryFetcher`] - manifest file retrieval with a partial-result policy
//! - [`ExportSummary`] - what a finished export produced

pub mod fetcher;
pub mod manager;
pub mod summary;

pub use fetcher::{BinaryFetcher, FetchResult};
pub use manager::{extract_job_id, ExportJobManager};
pub use summary::{DroppedEntry, ExportSummary};
