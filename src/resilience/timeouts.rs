//! Per-attempt deadlines for outbound calls.
//!
//! Every attempt gets its own deadline, so a hung dependency costs at most
//! `timeout` per attempt and the retry policy sees the expiry as transient.

use std::future::Future;
use std::time::Duration;

use crate::resilience::outcome::FailureKind;

/// Run `fut`, turning an elapsed deadline into [`FailureKind::Transient`].
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, FailureKind>
where
    F: Future<Output = Result<T, FailureKind>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FailureKind::Transient(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}
