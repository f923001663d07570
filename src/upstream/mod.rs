//! Outbound dependency clients.
//!
//! # Data Flow
//! ```text
//! PropertyService
//!     → ResilientExecutor (per dependency)
//!     → store.rs (PostgREST property table)  | users.rs (user service)
//!     → one HTTP round trip, outcome classified into FailureKind
//! ```
//!
//! # Design Decisions
//! - Clients never retry; they only classify
//! - Connection errors, timeouts, 5xx, 408 and 429 are transient
//! - Other 4xx and undecodable bodies are permanent
//! - The caller's bearer token is forwarded so the store enforces row access

pub mod store;
pub mod users;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::properties::model::{Property, PropertyUpdate};
use crate::resilience::FailureKind;

pub use store::RestPropertyStore;
pub use users::HttpUserDirectory;

/// Caller credentials forwarded to dependencies.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// One operation against the property table.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    Insert(Property),
    FindById(String),
    /// `None` means no limit.
    List { limit: Option<usize> },
    ListByUser(String),
    Update { id: String, patch: PropertyUpdate },
    Delete(String),
}

impl StoreRequest {
    /// Short label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            StoreRequest::Insert(_) => "insert",
            StoreRequest::FindById(_) => "find_by_id",
            StoreRequest::List { .. } => "list",
            StoreRequest::ListByUser(_) => "list_by_user",
            StoreRequest::Update { .. } => "update",
            StoreRequest::Delete(_) => "delete",
        }
    }
}

/// The property store. Every operation returns the affected rows.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn execute(
        &self,
        token: &AccessToken,
        request: &StoreRequest,
    ) -> Result<Vec<Property>, FailureKind>;
}

/// The companion user service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_user(&self, token: &AccessToken, user_id: &str) -> Result<Value, FailureKind>;
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: StatusCode, body: &str) -> FailureKind {
    let message = if body.is_empty() {
        format!("upstream returned {}", status)
    } else {
        format!("upstream returned {}: {}", status, truncate(body, 200))
    };

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        FailureKind::Transient(message)
    } else {
        FailureKind::Permanent(message)
    }
}

/// Classify a transport-level error from reqwest.
pub fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if err.is_decode() {
        return FailureKind::Permanent(format!("malformed response: {}", err));
    }
    if err.is_builder() {
        return FailureKind::Permanent(format!("invalid request: {}", err));
    }
    if let Some(status) = err.status() {
        return classify_status(status, "");
    }
    // Timeouts, refused connections, resets and body read failures.
    FailureKind::Transient(err.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
