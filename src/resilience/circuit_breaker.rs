//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one probe call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= fail_max
//! Open → Half-Open: first call after reset_timeout (becomes the probe)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails or is dropped before finishing
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, owned by its executor (never global)
//! - State lives behind a std `Mutex` that is never held across `.await`
//! - The probe slot is claimed inside the same critical section that reads
//!   the state, so two callers can never both probe
//! - A whole retry sequence counts as one call

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::outcome::CallError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Consecutive-failure circuit breaker guarding one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    fail_max: u32,
    reset_timeout: Duration,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, fail_max: u32, reset_timeout: Duration) -> Self {
        let dependency = dependency.into();
        metrics::record_breaker_state(&dependency, CircuitState::Closed);
        Self {
            dependency,
            fail_max: fail_max.max(1),
            reset_timeout,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn from_config(dependency: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            dependency,
            config.fail_max,
            Duration::from_secs(config.reset_timeout_secs),
        )
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let core = self.lock();
        CircuitSnapshot {
            state: core.state,
            consecutive_failures: core.consecutive_failures,
            last_failure_at: core.last_failure_at,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `f` if the breaker allows it and record the outcome.
    ///
    /// Rejected calls return [`CallError::CircuitOpen`] without invoking `f`.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let permit = self.acquire()?;
        let result = f().await;

        let healthy = match &result {
            Ok(_) => true,
            Err(err) => !err.is_dependency_failure(),
        };
        permit.settle(healthy);

        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCore> {
        // Every critical section leaves the core consistent, so a poisoned
        // lock still holds usable state.
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn acquire(&self) -> Result<Permit<'_>, CallError> {
        let mut core = self.lock();
        let state = core.state;

        let probe = match state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled = core
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.reset_timeout);
                if !cooled {
                    drop(core);
                    return Err(self.reject());
                }
                self.transition(&mut core, CircuitState::HalfOpen);
                core.probe_in_flight = true;
                tracing::info!(dependency = %self.dependency, "Circuit half-open, sending probe");
                true
            }
            CircuitState::HalfOpen => {
                if core.probe_in_flight {
                    drop(core);
                    return Err(self.reject());
                }
                core.probe_in_flight = true;
                true
            }
        };

        Ok(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    fn reject(&self) -> CallError {
        tracing::debug!(dependency = %self.dependency, "Circuit open, rejecting call");
        metrics::record_breaker_rejection(&self.dependency);
        CallError::CircuitOpen {
            dependency: self.dependency.clone(),
        }
    }

    fn on_success(&self, probe: bool) {
        let mut core = self.lock();
        if probe {
            core.probe_in_flight = false;
            core.consecutive_failures = 0;
            core.opened_at = None;
            self.transition(&mut core, CircuitState::Closed);
            tracing::info!(dependency = %self.dependency, "Probe succeeded, circuit closed");
        } else if core.state == CircuitState::Closed {
            core.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut core = self.lock();
        let now = Instant::now();
        core.last_failure_at = Some(now);

        if probe {
            core.probe_in_flight = false;
            core.opened_at = Some(now);
            self.transition(&mut core, CircuitState::Open);
            tracing::warn!(dependency = %self.dependency, "Probe failed, circuit re-opened");
            return;
        }

        // Outcomes of calls admitted before the breaker opened do not move it.
        if core.state != CircuitState::Closed {
            return;
        }

        core.consecutive_failures += 1;
        if core.consecutive_failures >= self.fail_max {
            core.opened_at = Some(now);
            self.transition(&mut core, CircuitState::Open);
            tracing::warn!(
                dependency = %self.dependency,
                failures = core.consecutive_failures,
                reset_timeout = ?self.reset_timeout,
                "Circuit opened"
            );
        }
    }

    fn transition(&self, core: &mut BreakerCore, to: CircuitState) {
        if core.state != to {
            core.state = to;
            metrics::record_breaker_state(&self.dependency, to);
        }
    }
}

/// Admission ticket for one call; reports its outcome exactly once.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, healthy: bool) {
        self.settled = true;
        if healthy {
            self.breaker.on_success(self.probe);
        } else {
            self.breaker.on_failure(self.probe);
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // A probe cancelled mid-flight must not leave the breaker half-open
        // with its only slot taken.
        if !self.settled && self.probe {
            tracing::warn!(dependency = %self.breaker.dependency, "Probe abandoned");
            self.breaker.on_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::outcome::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    const RESET: Duration = Duration::from_secs(30);

    fn exhausted() -> CallError {
        CallError::RetryExhausted {
            dependency: "store".into(),
            attempts: 3,
            last: "connection refused".into(),
        }
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), CallError> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(exhausted())
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), CallError> {
        breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new("store", 3, RESET);
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            assert_eq!(fail(&breaker, &calls).await, Err(exhausted()));
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 2);

        assert_eq!(succeed(&breaker, &calls).await, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new("store", 3, RESET);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.snapshot().last_failure_at.is_some());

        tokio::time::advance(RESET - Duration::from_secs(1)).await;
        let rejected = succeed(&breaker, &calls).await;
        assert_eq!(rejected, Err(CallError::CircuitOpen { dependency: "store".into() }));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "open circuit must not call through");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let breaker = CircuitBreaker::new("store", 3, RESET);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        let _ = succeed(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_does_not_count() {
        let breaker = CircuitBreaker::new("store", 1, RESET);

        let result: Result<(), _> = breaker
            .call(|| async { Err(CallError::Failure(FailureKind::Permanent("422".into()))) })
            .await;

        assert!(matches!(result, Err(CallError::Failure(FailureKind::Permanent(_)))));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_exactly_one_probe() {
        let breaker = Arc::new(CircuitBreaker::new("store", 1, RESET));
        let calls = Arc::new(AtomicU32::new(0));
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(RESET).await;

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let probe = {
            let breaker = breaker.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok(())
                    })
                    .await
            })
        };

        // Let the probe claim its slot.
        tokio::task::yield_now().await;
        while breaker.state() != CircuitState::HalfOpen {
            tokio::task::yield_now().await;
        }

        let concurrent = succeed(&breaker, &calls).await;
        assert_eq!(concurrent, Err(CallError::CircuitOpen { dependency: "store".into() }));

        release_tx.send(()).unwrap();
        assert_eq!(probe.await.unwrap(), Ok(()));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_with_fresh_cooldown() {
        let breaker = CircuitBreaker::new("store", 1, RESET);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(RESET).await;
        assert_eq!(fail(&breaker, &calls).await, Err(exhausted()));
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(RESET / 2).await;
        assert!(matches!(
            succeed(&breaker, &calls).await,
            Err(CallError::CircuitOpen { .. })
        ));

        tokio::time::advance(RESET / 2).await;
        assert_eq!(succeed(&breaker, &calls).await, Ok(()));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_probe_reopens() {
        let breaker = CircuitBreaker::new("store", 1, RESET);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(RESET).await;

        let hung = breaker.call(|| std::future::pending::<Result<(), CallError>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), hung).await;
        assert!(timed_out.is_err());

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            succeed(&breaker, &calls).await,
            Err(CallError::CircuitOpen { .. })
        ));
    }
}
