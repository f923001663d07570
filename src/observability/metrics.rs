//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, endpoint, status
//! - `http_request_duration_seconds` (histogram): latency by method, endpoint
//! - `dependency_calls_total` (counter): outbound calls by dependency, operation, outcome
//! - `dependency_retries_total` (counter): retry attempts by dependency
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `circuit_breaker_rejections_total` (counter): calls refused by an open breaker
//! - `events_published_total` (counter): view events by outcome
//!
//! The Prometheus recorder is process-global; it is installed once and every
//! server instance renders the same handle.

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::resilience::CircuitState;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus recorder installed");
                handle
            }
            Err(e) => {
                // Someone else owns the global recorder; expose an empty one.
                tracing::warn!(error = %e, "Failed to install Prometheus recorder");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

pub fn record_request(method: &str, endpoint: &str, status: u16, start: Instant) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_dependency_call(dependency: &str, operation: &str, outcome: &'static str) {
    metrics::counter!(
        "dependency_calls_total",
        "dependency" => dependency.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry(dependency: &str) {
    metrics::counter!("dependency_retries_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("circuit_breaker_state", "dependency" => dependency.to_string()).set(value);
}

pub fn record_breaker_rejection(dependency: &str) {
    metrics::counter!("circuit_breaker_rejections_total", "dependency" => dependency.to_string())
        .increment(1);
}

pub fn record_event_publish(outcome: &'static str) {
    metrics::counter!("events_published_total", "outcome" => outcome).increment(1);
}
