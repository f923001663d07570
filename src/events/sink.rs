//! Message bus sink over a REST proxy.

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::events::{EventSink, PropertyEvent, PublishError};

/// Posts events to `{broker}/topics/{topic}` as keyed records.
#[derive(Debug, Clone)]
pub struct HttpEventSink {
    client: reqwest::Client,
    topic_url: Url,
}

impl HttpEventSink {
    pub fn new(client: reqwest::Client, broker_url: &str, topic: &str) -> Result<Self, url::ParseError> {
        let topic_url = Url::parse(&format!(
            "{}/topics/{}",
            broker_url.trim_end_matches('/'),
            topic
        ))?;
        Ok(Self { client, topic_url })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish(&self, event: &PropertyEvent) -> Result<(), PublishError> {
        let body = json!({
            "records": [{ "key": event.user_id, "value": event }]
        });

        let response = self
            .client
            .post(self.topic_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(PublishError::Unavailable(format!("broker returned {}", status)))
        } else {
            Err(PublishError::Rejected(format!("broker returned {}", status)))
        }
    }
}
