//! Error responses.
//!
//! # Responsibilities
//! - Map every failure to a status code and a JSON `{"detail": ...}` body
//! - Keep degraded-dependency errors (503) distinct from data errors
//!
//! # Design Decisions
//! - Permanent upstream failures that are not a known case map to 400
//! - Breaker-open and retry-exhausted both map to 503

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::CallError;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("No fields provided for update.")]
    EmptyUpdate,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotFoundOrEnrichment(String),

    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::EmptyUpdate | ApiError::Upstream(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) | ApiError::NotFoundOrEnrichment(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        if err.is_unavailable() {
            ApiError::ServiceUnavailable(err.to_string())
        } else {
            ApiError::Upstream(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}
