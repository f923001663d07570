//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the caller sent one
//! - Attach the request ID to the request span and echo it on the response
//! - Record per-route request counts and latency
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Metrics are labelled by the matched route template, never the raw path

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, HeaderName, Request},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns `x-request-id` to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request ID assigned by [`set_request_id_layer`], if any.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Span for one request, carrying method, path and request ID.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request_id(request.headers()).unwrap_or_else(|| "-".to_string());
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id
    )
}

/// Count and time every routed request.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::record_request(&method, &endpoint, response.status().as_u16(), start);
    response
}
