//! Bearer token extraction.
//!
//! The token is not verified here; it is forwarded to the store, which
//! enforces row-level access with it.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::http::response::ApiError;
use crate::upstream::AccessToken;

/// Reject requests without a bearer token; otherwise expose it to handlers
/// as an [`AccessToken`] extension.
pub async fn require_bearer(mut request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing or malformed bearer token.".into()))?;

    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<AccessToken> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(AccessToken::new(token))
    } else {
        None
    }
}
