//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency (store, user service):
//!     → executor.rs (composes the layers below, one instance per dependency)
//!     → circuit_breaker.rs (fail fast while the dependency is known bad)
//!     → retries.rs (retry transient failures with backoff.rs delays)
//!     → timeouts.rs (deadline on every attempt)
//! ```
//!
//! # Design Decisions
//! - Clients classify failures (outcome.rs); these layers only act on the class
//! - Permanent failures are never retried and never trip the breaker
//! - Breaker state is owned by the executor, not global

pub mod backoff;
pub mod circuit_breaker;
pub mod executor;
pub mod outcome;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use executor::ResilientExecutor;
pub use outcome::{CallError, FailureKind};
pub use retries::RetryPolicy;
