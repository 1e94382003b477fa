//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{BridgeConfig, Environment, PostgreSQLConfig, StoreBackend};
use super::secret_string;
use crate::domain::errors::BridgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const ENV_PREFIX: &str = "FHIRBRIDGE";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`BridgeConfig`]
/// 4. Applies environment variable overrides (`FHIRBRIDGE_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`BridgeError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, an override
/// has an invalid value, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use fhirbridge::config::loader::load_config;
///
/// let config = load_config("fhirbridge.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BridgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text, applying the same steps as [`load_config`]
pub fn parse_config(contents: &str) -> Result<BridgeConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BridgeConfig = toml::from_str(&contents)
        .map_err(|e| BridgeError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        BridgeError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are copied unchanged. Every missing variable is reported,
/// not just the first.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BridgeError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(BridgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{key}")).ok()
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
            BridgeError::Configuration(format!("Invalid value for {ENV_PREFIX}_{key}: {e}"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using the `FHIRBRIDGE_` prefix
///
/// Environment variables follow the pattern `FHIRBRIDGE_<SECTION>_<KEY>`,
/// for example `FHIRBRIDGE_SOURCE_BASE_URL` or `FHIRBRIDGE_EXPORT_LAND`.
fn apply_env_overrides(config: &mut BridgeConfig) -> Result<()> {
    if let Some(val) = env_var("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_var("ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid value for {ENV_PREFIX}_ENVIRONMENT: {other}"
                )))
            }
        };
    }

    // Servers
    if let Some(val) = env_var("SOURCE_BASE_URL") {
        config.source.base_url = val;
    }
    if let Some(val) = env_parse("SOURCE_TLS_VERIFY")? {
        config.source.tls_verify = val;
    }
    if let Some(val) = env_parse("SOURCE_TIMEOUT_SECONDS")? {
        config.source.timeout_seconds = val;
    }
    if let Some(val) = env_var("DESTINATION_BASE_URL") {
        config.destination.base_url = val;
    }
    if let Some(val) = env_parse("DESTINATION_TLS_VERIFY")? {
        config.destination.tls_verify = val;
    }
    if let Some(val) = env_parse("DESTINATION_TIMEOUT_SECONDS")? {
        config.destination.timeout_seconds = val;
    }

    // Export
    if let Some(val) = env_var("EXPORT_RESOURCE_TYPES") {
        config.export.resource_types = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(val) = env_parse("EXPORT_POLL_INTERVAL_SECONDS")? {
        config.export.poll_interval_seconds = val;
    }
    if let Some(val) = env_parse("EXPORT_MAX_POLL_ATTEMPTS")? {
        config.export.max_poll_attempts = val;
    }
    if let Some(val) = env_parse("EXPORT_LAND")? {
        config.export.land = val;
    }

    if let Some(val) = env_var("TRANSFORM_ID_PREFIX") {
        config.transform.id_prefix = val;
    }
    if let Some(val) = env_var("ARTIFACTS_ROOT_DIR") {
        config.artifacts.root_dir = val;
    }

    // Import
    if let Some(val) = env_var("IMPORT_ARTIFACT_BASE_URL") {
        config.import.artifact_base_url = Some(val);
    }
    if let Some(val) = env_parse("IMPORT_MAX_BATCH_RESOURCE_COUNT")? {
        config.import.max_batch_resource_count = val;
    }

    // Jobs
    if let Some(val) = env_parse("JOBS_JOB_TIMEOUT_SECONDS")? {
        config.jobs.job_timeout_seconds = val;
    }
    if let Some(val) = env_parse("JOBS_CACHE_ENABLED")? {
        config.jobs.cache_enabled = val;
    }

    // Store
    if let Some(val) = env_var("STORE_BACKEND") {
        config.store.backend = match val.to_lowercase().as_str() {
            "file" => StoreBackend::File,
            "postgresql" => StoreBackend::PostgreSQL,
            other => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid value for {ENV_PREFIX}_STORE_BACKEND: {other}"
                )))
            }
        };
    }
    if let Some(val) = env_var("STORE_PATH") {
        config.store.path = val;
    }
    if let Some(val) = env_var("STORE_POSTGRESQL_CONNECTION_STRING") {
        match config.store.postgresql.as_mut() {
            Some(pg) => pg.connection_string = secret_string(val),
            None => config.store.postgresql = Some(PostgreSQLConfig::new(secret_string(val))),
        }
    }

    // Logging
    if let Some(val) = env_parse("LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_var("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
