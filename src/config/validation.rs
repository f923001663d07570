//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate dependency URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_http_url(&mut errors, "store.url", &config.store.url);
    check_http_url(&mut errors, "users.base_url", &config.users.base_url);
    if let Some(broker) = &config.events.broker_url {
        check_http_url(&mut errors, "events.broker_url", broker);
    }

    if config.store.table.trim().is_empty() {
        errors.push(ValidationError::new("store.table", "must not be empty"));
    }
    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be greater than 0"));
    }
    if config.users.timeout_ms == 0 {
        errors.push(ValidationError::new("users.timeout_ms", "must be greater than 0"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    } else {
        let budget = config.dependency_budget();
        if Duration::from_secs(config.server.request_timeout_secs) < budget {
            errors.push(ValidationError::new(
                "server.request_timeout_secs",
                format!(
                    "{}s is shorter than the retried store and user-service budget ({}ms)",
                    config.server.request_timeout_secs,
                    budget.as_millis()
                ),
            ));
        }
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            format!(
                "{} exceeds retries.max_delay_ms ({})",
                config.retries.base_delay_ms, config.retries.max_delay_ms
            ),
        ));
    }

    if config.circuit_breaker.fail_max == 0 {
        errors.push(ValidationError::new("circuit_breaker.fail_max", "must be at least 1"));
    }
    if config.circuit_breaker.reset_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.reset_timeout_secs",
            "must be greater than 0",
        ));
    }

    for origin in &config.server.cors_allowed_origins {
        if origin != "*" && Url::parse(origin).is_err() {
            errors.push(ValidationError::new(
                "server.cors_allowed_origins",
                format!("'{}' is not a valid origin", origin),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}
