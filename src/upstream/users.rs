//! Client for the companion user service.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::UserServiceConfig;
use crate::resilience::FailureKind;
use crate::upstream::{classify_status, classify_transport, AccessToken, UserDirectory};

#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUserDirectory {
    pub fn new(client: reqwest::Client, config: &UserServiceConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
        })
    }

    fn user_url(&self, user_id: &str) -> Result<Url, FailureKind> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FailureKind::Permanent(format!("cannot build user URL from {}", self.base_url)))?
            .pop_if_empty()
            .extend(["users", user_id]);
        Ok(url)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn fetch_user(&self, token: &AccessToken, user_id: &str) -> Result<Value, FailureKind> {
        let response = self
            .client
            .get(self.user_url(user_id)?)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response.json::<Value>().await.map_err(|e| classify_transport(&e))
    }
}
