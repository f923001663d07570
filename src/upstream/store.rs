//! PostgREST client for the property table.

use async_trait::async_trait;
use url::Url;

use crate::config::StoreConfig;
use crate::properties::model::Property;
use crate::resilience::FailureKind;
use crate::upstream::{classify_status, classify_transport, AccessToken, PropertyStore, StoreRequest};

/// Property store reached over the PostgREST HTTP API.
#[derive(Debug, Clone)]
pub struct RestPropertyStore {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl RestPropertyStore {
    pub fn new(client: reqwest::Client, config: &StoreConfig) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            config.table
        ))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, request: &StoreRequest) -> reqwest::RequestBuilder {
        let url = self.endpoint.clone();
        match request {
            StoreRequest::Insert(property) => self.client.post(url).json(&property.for_insert()),
            StoreRequest::FindById(id) => self
                .client
                .get(url)
                .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]),
            StoreRequest::List { limit } => {
                let builder = self.client.get(url).query(&[("select", "*")]);
                match limit {
                    Some(n) => builder.query(&[("limit", n)]),
                    None => builder,
                }
            }
            StoreRequest::ListByUser(user_id) => self
                .client
                .get(url)
                .query(&[("select", "*".to_string()), ("user_id", format!("eq.{}", user_id))]),
            StoreRequest::Update { id, patch } => self
                .client
                .patch(url)
                .query(&[("id", format!("eq.{}", id))])
                .json(patch),
            StoreRequest::Delete(id) => self
                .client
                .delete(url)
                .query(&[("id", format!("eq.{}", id))]),
        }
    }
}

#[async_trait]
impl PropertyStore for RestPropertyStore {
    async fn execute(
        &self,
        token: &AccessToken,
        request: &StoreRequest,
    ) -> Result<Vec<Property>, FailureKind> {
        let response = self
            .request(request)
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<Vec<Property>>()
            .await
            .map_err(|e| classify_transport(&e))
    }
}
