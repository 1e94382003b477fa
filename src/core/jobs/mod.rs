//! Job bookkeeping and supervision
//!
//! - [`JobRegistry`] - store-first job persistence with an optional read cache
//! - [`JobSupervisor`] - tracked, deadline-bounded background job tasks

pub mod cache;
pub mod registry;
pub mod supervisor;

pub use cache::JobCache;
pub use registry::{CachedStatus, JobOutcome, JobRegistry};
pub use supervisor::JobSupervisor;
