//! Best-effort view events.
//!
//! # Data Flow
//! ```text
//! PropertyService (after a successful read)
//!     → publisher.rs (spawn, bounded by publish timeout)
//!     → sink.rs (POST to the message bus REST endpoint)
//! ```
//!
//! # Design Decisions
//! - The request never waits for the publish
//! - Publish errors are logged and counted, never returned to the caller
//! - No transaction ties the store read to the publish

pub mod publisher;
pub mod sink;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use publisher::EventPublisher;
pub use sink::HttpEventSink;

pub const PROPERTY_VIEWED: &str = "property_viewed";

/// An event emitted when a user views a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub property_id: String,
    /// The viewer; also the partition key.
    pub user_id: String,
    pub occurred_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl PropertyEvent {
    pub fn viewed(property_id: &str, user_id: &str, request_id: Option<String>) -> Self {
        let occurred_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            event_id: Uuid::new_v4(),
            event_type: PROPERTY_VIEWED.to_string(),
            property_id: property_id.to_string(),
            user_id: user_id.to_string(),
            occurred_at_ms,
            request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),

    #[error("event sink rejected event: {0}")]
    Rejected(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Destination for property events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &PropertyEvent) -> Result<(), PublishError>;
}
