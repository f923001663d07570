//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! Every section has defaults, so an empty file (or no file) is valid and the
//! environment fills in deployment specifics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::calculate_backoff;

/// Root configuration for the property service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener, routing prefix and HTTP middleware settings.
    pub server: ServerConfig,

    /// Managed property store (PostgREST-compatible).
    pub store: StoreConfig,

    /// Companion user service used for enrichment.
    pub users: UserServiceConfig,

    /// View event publishing.
    pub events: EventConfig,

    /// Retry policy applied to every dependency.
    pub retries: RetryConfig,

    /// Circuit breaker settings applied to every dependency.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Worst-case time a request spends on dependencies: a fully retried
    /// store call followed by a fully retried user lookup.
    pub fn dependency_budget(&self) -> Duration {
        self.retries.worst_case(Duration::from_millis(self.store.timeout_ms))
            + self.retries.worst_case(Duration::from_millis(self.users.timeout_ms))
    }
}

/// Deployment mode; production mounts the API under a path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    /// Prefix for API routes in this mode ("" when unprefixed).
    pub fn path_prefix(self) -> &'static str {
        match self {
            DeploymentMode::Development => "",
            DeploymentMode::Production => "/property-managing",
        }
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DeploymentMode::Development),
            "production" | "prod" => Ok(DeploymentMode::Production),
            other => Err(format!("unknown deployment mode '{}'", other)),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Deployment mode (controls the API path prefix).
    pub mode: DeploymentMode,

    /// Whole-request timeout in seconds; must cover the dependency budget.
    pub request_timeout_secs: u64,

    /// Origins allowed by CORS; `*` allows any. Empty disables CORS headers.
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: DeploymentMode::Development,
            request_timeout_secs: 40,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Property store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store (e.g. "https://xyz.supabase.co").
    pub url: String,

    /// Project API key sent as the `apikey` header.
    pub api_key: String,

    /// Table holding property rows.
    pub table: String,

    /// Deadline for a single attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            table: "properties".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// How a failed user-data lookup affects a property read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    /// Return the property without `user_data`.
    #[default]
    BestEffort,
    /// Fail the read with a not-found-or-enrichment error.
    Required,
}

/// Companion user service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserServiceConfig {
    /// Base URL of the user service.
    pub base_url: String,

    /// Deadline for a single attempt, in milliseconds.
    pub timeout_ms: u64,

    /// Failure handling for enrichment.
    pub enrichment: EnrichmentMode,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_ms: 2_000,
            enrichment: EnrichmentMode::BestEffort,
        }
    }
}

/// Event publishing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    /// REST endpoint of the message bus; events are dropped when unset.
    pub broker_url: Option<String>,

    /// Topic receiving view events.
    pub topic: String,

    /// Upper bound on a single publish, in milliseconds.
    pub publish_timeout_ms: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            broker_url: None,
            topic: "property-views".to_string(),
            publish_timeout_ms: 500,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl RetryConfig {
    /// Longest a retried call can take when every attempt runs into
    /// `attempt_timeout`, with jitter at its maximum.
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let base = Duration::from_millis(self.base_delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);

        (1..attempts).fold(attempt_timeout * attempts, |total, attempt| {
            let delay = calculate_backoff(attempt, base, max, false);
            if self.jitter {
                total + delay + delay / 10
            } else {
                total + delay
            }
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 6_000,
            jitter: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls that open the circuit.
    pub fail_max: u32,

    /// Seconds the circuit stays open before a probe is allowed.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
