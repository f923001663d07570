//! Outcome types shared by every layer of an outbound call.

use thiserror::Error;

/// How a single dependency call failed.
///
/// The client performing the network round trip decides the class; the
/// retry and breaker layers only act on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// Likely to succeed if tried again (timeouts, refused connections, 5xx).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Will fail the same way on every attempt (4xx, malformed response).
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            FailureKind::Transient(msg) | FailureKind::Permanent(msg) => msg,
        }
    }
}

/// Result of a call made through the resilience stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The dependency failed in a way the policy passes straight through.
    #[error(transparent)]
    Failure(FailureKind),

    /// Every attempt allowed by the retry policy failed transiently.
    #[error("{dependency}: retries exhausted after {attempts} attempts ({last})")]
    RetryExhausted {
        dependency: String,
        attempts: u32,
        last: String,
    },

    /// The breaker rejected the call without touching the network.
    #[error("{dependency}: circuit open")]
    CircuitOpen { dependency: String },
}

impl CallError {
    /// Whether this outcome says the dependency itself is unhealthy.
    ///
    /// A permanent failure means the dependency answered, so it does not
    /// count against the breaker.
    pub fn is_dependency_failure(&self) -> bool {
        match self {
            CallError::Failure(kind) => kind.is_transient(),
            CallError::RetryExhausted { .. } => true,
            CallError::CircuitOpen { .. } => false,
        }
    }

    /// Whether callers should see this as a degraded service (503).
    pub fn is_unavailable(&self) -> bool {
        match self {
            CallError::Failure(kind) => kind.is_transient(),
            CallError::RetryExhausted { .. } | CallError::CircuitOpen { .. } => true,
        }
    }
}

impl From<FailureKind> for CallError {
    fn from(kind: FailureKind) -> Self {
        CallError::Failure(kind)
    }
}
