//! Job store factory

use super::file::FileJobStore;
use super::postgresql::PostgresJobStore;
use super::traits::JobStore;
use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{BridgeError, Result};
use std::sync::Arc;

/// Creates the configured job store and makes sure its schema exists
///
/// # Errors
///
/// Returns a configuration error for incomplete settings, or
/// [`BridgeError::StoreUnavailable`] if the backend cannot be reached.
pub async fn create_job_store(config: &StoreConfig) -> Result<Arc<dyn JobStore>> {
    let store: Arc<dyn JobStore> = match config.backend {
        StoreBackend::File => {
            tracing::info!(path = %config.path, "Using file job store");
            Arc::new(FileJobStore::new(&config.path))
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                BridgeError::Configuration(
                    "store.postgresql configuration is required when store.backend = 'postgresql'"
                        .to_string(),
                )
            })?;
            tracing::info!("Using PostgreSQL job store");
            Arc::new(PostgresJobStore::new(pg_config)?)
        }
    };

    store.ensure_schema().await?;
    Ok(store)
}
