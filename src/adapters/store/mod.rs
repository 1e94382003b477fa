//! Job store backends
//!
//! - [`FileJobStore`] - one JSON document per job in a directory (default)
//! - [`PostgresJobStore`] - `bridge_jobs` table via a deadpool connection pool

pub mod factory;
pub mod file;
pub mod postgresql;
pub mod traits;

pub use factory::create_job_store;
pub use file::FileJobStore;
pub use postgresql::PostgresJobStore;
pub use traits::JobStore;
