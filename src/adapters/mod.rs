//! External system integrations for fhirbridge.
//!
//! - [`fhir`] - HTTP client for the source registry and the destination server
//! - [`store`] - job store trait with file and PostgreSQL backends
//!
//! # Example
//!
//! ```rust,no_run
//! use fhirbridge::adapters::fhir::FhirClient;
//! use fhirbridge::config::FhirServerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FhirClient::new(&FhirServerConfig::new("https://registry.example.org/fhir"))?;
//! let poll_url = client
//!     .kickoff_export(&["Immunization".to_string(), "Condition".to_string()])
//!     .await?;
//! println!("Polling {poll_url}");
//! # Ok(())
//! # }
//! ```

pub mod fhir;
pub mod store;
