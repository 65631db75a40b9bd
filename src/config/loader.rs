//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::MirrorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
///
/// Without a file every section takes its defaults.
pub fn load_config(path: Option<&Path>) -> Result<MirrorConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => MirrorConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<MirrorConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `PORT`, `UPSTREAM_BASE_URL`, `UPSTREAM_TIMEOUT_MS` and `SERVICE_NAME`.
pub fn apply_env_overrides<F>(config: &mut MirrorConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let parsed = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::Env { key: "PORT", value: port.clone() })?;
        config.listener.set_port(parsed);
    }

    if let Some(base_url) = lookup("UPSTREAM_BASE_URL") {
        config.upstream.base_url = base_url;
    }

    if let Some(timeout) = lookup("UPSTREAM_TIMEOUT_MS") {
        config.timeouts.request_ms = timeout
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { key: "UPSTREAM_TIMEOUT_MS", value: timeout.clone() })?;
    }

    if let Some(name) = lookup("SERVICE_NAME") {
        config.observability.service_name = name;
    }

    Ok(())
}
