//! Configuration management for fhirbridge.
//!
//! fhirbridge reads a TOML file with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `FHIRBRIDGE_<SECTION>_<KEY>` environment overrides
//! - Default values for everything except the two server base URLs
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [source]
//! base_url = "https://registry.example.org/fhir"
//!
//! [destination]
//! base_url = "https://store.example.org/fhir"
//!
//! [export]
//! resource_types = ["Patient", "Condition", "Immunization"]
//! land = "transaction"
//!
//! [store]
//! backend = "postgresql"
//!
//! [store.postgresql]
//! connection_string = "${FHIRBRIDGE_PG_DSN}"
//! ```
//!
//! ```rust,no_run
//! use fhirbridge::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhirbridge.toml")?;
//! println!("Source registry: {}", config.source.base_url);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, ArtifactsConfig, BridgeConfig, Environment, ExportConfig,
    FhirServerConfig, ImportConfig, JobsConfig, LandStrategy, LoggingConfig, PostgreSQLConfig,
    RetryConfig, StoreBackend, StoreConfig, TransformConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
