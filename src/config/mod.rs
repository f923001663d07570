//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (optional, dotenvy)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, then environment overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once at startup to build clients and executors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, DeploymentMode, EnrichmentMode, EventConfig, LogFormat,
    ObservabilityConfig, RetryConfig, ServerConfig, ServiceConfig, StoreConfig,
    UserServiceConfig,
};
