//! Composed call path for one dependency.
//!
//! ```text
//! run(op)
//!     → circuit_breaker (reject early when open)
//!     → retries (transient failures, backoff between attempts)
//!     → timeouts (deadline per attempt)
//!     → op (one network round trip)
//! ```
//!
//! Built once per dependency at startup and shared behind an `Arc`.

use std::future::Future;
use std::time::Duration;

use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::resilience::outcome::{CallError, FailureKind};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_deadline;

#[derive(Debug)]
pub struct ResilientExecutor {
    dependency: String,
    attempt_timeout: Duration,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ResilientExecutor {
    pub fn new(
        dependency: impl Into<String>,
        attempt_timeout: Duration,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            attempt_timeout,
            retry,
            breaker,
        }
    }

    pub fn from_config(
        dependency: &str,
        attempt_timeout: Duration,
        retries: &RetryConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Self {
        Self::new(
            dependency,
            attempt_timeout,
            RetryPolicy::from_config(retries),
            CircuitBreaker::from_config(dependency, breaker),
        )
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn breaker(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Run `op` under the breaker, retry policy and per-attempt deadline.
    ///
    /// `operation` only labels logs and metrics.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FailureKind>>,
    {
        let timeout = self.attempt_timeout;
        let dependency = self.dependency.as_str();
        let retry = &self.retry;
        let op = &mut op;

        let result = self
            .breaker
            .call(move || retry.execute(dependency, move || with_deadline(timeout, op())))
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(CallError::Failure(FailureKind::Permanent(_))) => "permanent",
            Err(CallError::Failure(FailureKind::Transient(_))) => "transient",
            Err(CallError::RetryExhausted { .. }) => "exhausted",
            Err(CallError::CircuitOpen { .. }) => "circuit_open",
        };
        metrics::record_dependency_call(dependency, operation, outcome);

        if let Err(err) = &result {
            tracing::debug!(dependency, operation, error = %err, "Dependency call failed");
        }

        result
    }
}
