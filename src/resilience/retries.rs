//! Retry logic.
//!
//! # Responsibilities
//! - Retry transient failures with exponential backoff + jitter
//! - Pass permanent failures straight through
//! - Report exhaustion as a distinct outcome
//!
//! The backoff wait is a `tokio::time::sleep`, so only the calling task is
//! suspended while it waits.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::outcome::{CallError, FailureKind};

/// Bounded retry policy for one dependency.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: true,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
        .with_jitter(config.jitter)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<T, F, Fut>(&self, dependency: &str, mut op: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FailureKind>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let reason = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(dependency, attempt, "Dependency call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(FailureKind::Permanent(msg)) => {
                    return Err(CallError::Failure(FailureKind::Permanent(msg)));
                }
                Err(FailureKind::Transient(msg)) => msg,
            };

            if attempt >= self.max_attempts {
                tracing::warn!(dependency, attempts = attempt, error = %reason, "Retries exhausted");
                return Err(CallError::RetryExhausted {
                    dependency: dependency.to_string(),
                    attempts: attempt,
                    last: reason,
                });
            }

            let delay = calculate_backoff(attempt, self.base_delay, self.max_delay, self.jitter);
            tracing::info!(dependency, attempt, delay = ?delay, error = %reason, "Retrying dependency call");
            metrics::record_retry(dependency);
            tokio::time::sleep(delay).await;
        }
    }
}
