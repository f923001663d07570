//! Fire-and-forget publishing.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::events::{EventSink, PropertyEvent, PublishError};
use crate::observability::metrics;

/// Publishes events off the request path.
#[derive(Clone)]
pub struct EventPublisher {
    sink: Option<Arc<dyn EventSink>>,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>, timeout: Duration) -> Self {
        Self {
            sink: Some(sink),
            timeout,
        }
    }

    /// A publisher that drops every event (no broker configured).
    pub fn disabled() -> Self {
        Self {
            sink: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Publish, waiting at most the configured timeout.
    pub async fn publish(&self, event: &PropertyEvent) -> Result<(), PublishError> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };

        match tokio::time::timeout(self.timeout, sink.publish(event)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.timeout)),
        }
    }

    /// Publish on a background task. Failures are logged and counted only.
    ///
    /// The handle is returned for callers that want to observe completion;
    /// request handlers drop it.
    pub fn publish_detached(&self, event: PropertyEvent) -> JoinHandle<()> {
        let publisher = self.clone();

        tokio::spawn(async move {
            if !publisher.is_enabled() {
                tracing::debug!(event_id = %event.event_id, "Event publishing disabled, dropping event");
                metrics::record_event_publish("disabled");
                return;
            }

            match publisher.publish(&event).await {
                Ok(()) => {
                    tracing::debug!(
                        event_id = %event.event_id,
                        property_id = %event.property_id,
                        "Published view event"
                    );
                    metrics::record_event_publish("ok");
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        property_id = %event.property_id,
                        error = %e,
                        "Failed to publish view event"
                    );
                    metrics::record_event_publish("error");
                }
            }
        })
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish()
    }
}
