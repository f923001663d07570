//! Configuration loading from disk and environment.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file, environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{DeploymentMode, LogFormat, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

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

/// Load `.env`, then the optional TOML file, then environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    if let Ok(env_file) = dotenvy::dotenv() {
        tracing::debug!(path = ?env_file, "Loaded .env file");
    }

    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers can supply their own source.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PROPERTY_MANAGING_SERVER_PORT") {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: "PROPERTY_MANAGING_SERVER_PORT",
            message: format!("'{}': {}", port, e),
        })?;
    }
    if let Some(mode) = lookup("PROPERTY_MANAGING_SERVER_MODE") {
        config.server.mode = mode
            .parse::<DeploymentMode>()
            .map_err(|message| ConfigError::Env {
                var: "PROPERTY_MANAGING_SERVER_MODE",
                message,
            })?;
    }
    if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
        config.server.cors_allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(url) = lookup("SUPABASE_URL") {
        config.store.url = url;
    }
    if let Some(key) = lookup("SUPABASE_KEY") {
        config.store.api_key = key;
    }
    if let Some(url) = lookup("USER_SERVICE_URL") {
        config.users.base_url = url;
    }
    if let Some(url) = lookup("EVENT_BROKER_URL") {
        config.events.broker_url = Some(url).filter(|u| !u.trim().is_empty());
    }
    if let Some(topic) = lookup("EVENT_TOPIC") {
        config.events.topic = topic;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    message: format!("'{}' is not one of pretty, json", format),
                })
            }
        };
    }

    Ok(())
}
