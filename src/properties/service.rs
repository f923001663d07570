//! Property operations over the resilient dependency clients.
//!
//! Each operation validates its input, makes one store call through the
//! store executor and maps the outcome onto [`ApiError`]. Reads by id also
//! enrich the record from the user service (its own executor, so its
//! failures never trip the store breaker), and viewer reads publish a view
//! event off the request path.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EnrichmentMode, ServiceConfig};
use crate::events::{EventPublisher, PropertyEvent};
use crate::http::response::ApiError;
use crate::properties::model::{Property, PropertyUpdate};
use crate::resilience::{CircuitSnapshot, ResilientExecutor};
use crate::upstream::{AccessToken, PropertyStore, StoreRequest, UserDirectory};

pub const STORE_DEPENDENCY: &str = "store";
pub const USERS_DEPENDENCY: &str = "user_service";

pub struct PropertyService {
    store: Arc<dyn PropertyStore>,
    users: Arc<dyn UserDirectory>,
    store_calls: ResilientExecutor,
    user_calls: ResilientExecutor,
    events: EventPublisher,
    enrichment: EnrichmentMode,
}

impl PropertyService {
    pub fn new(
        store: Arc<dyn PropertyStore>,
        users: Arc<dyn UserDirectory>,
        store_calls: ResilientExecutor,
        user_calls: ResilientExecutor,
        events: EventPublisher,
        enrichment: EnrichmentMode,
    ) -> Self {
        Self {
            store,
            users,
            store_calls,
            user_calls,
            events,
            enrichment,
        }
    }

    /// Wire the service with one executor per dependency, as configured.
    pub fn from_config(
        config: &ServiceConfig,
        store: Arc<dyn PropertyStore>,
        users: Arc<dyn UserDirectory>,
        events: EventPublisher,
    ) -> Self {
        let store_calls = ResilientExecutor::from_config(
            STORE_DEPENDENCY,
            Duration::from_millis(config.store.timeout_ms),
            &config.retries,
            &config.circuit_breaker,
        );
        let user_calls = ResilientExecutor::from_config(
            USERS_DEPENDENCY,
            Duration::from_millis(config.users.timeout_ms),
            &config.retries,
            &config.circuit_breaker,
        );

        Self::new(store, users, store_calls, user_calls, events, config.users.enrichment)
    }

    pub fn store_breaker(&self) -> CircuitSnapshot {
        self.store_calls.breaker()
    }

    pub fn user_breaker(&self) -> CircuitSnapshot {
        self.user_calls.breaker()
    }

    pub async fn create(&self, token: &AccessToken, property: Property) -> Result<Property, ApiError> {
        property
            .validate()
            .map_err(|problems| ApiError::Validation(problems.join("; ")))?;

        let rows = self.call_store(token, StoreRequest::Insert(property)).await?;
        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("Store did not return the created property.".into()))?;

        tracing::info!(property_id = ?created.id, user_id = %created.user_id, "Property created");
        Ok(created)
    }

    pub async fn get(&self, token: &AccessToken, id: &str) -> Result<Property, ApiError> {
        let rows = self.call_store(token, StoreRequest::FindById(id.to_string())).await?;

        // Enrichment is never attempted for a missing record.
        let property = rows.into_iter().next().ok_or_else(|| not_found_by_id(id))?;
        self.enrich(token, property).await
    }

    /// Read as [`get`](Self::get), then publish a view event for `viewer_id`.
    pub async fn get_for_viewer(
        &self,
        token: &AccessToken,
        id: &str,
        viewer_id: &str,
        request_id: Option<String>,
    ) -> Result<Property, ApiError> {
        let property = self.get(token, id).await?;
        self.events
            .publish_detached(PropertyEvent::viewed(id, viewer_id, request_id));
        Ok(property)
    }

    /// List up to `count` properties; `0` means no limit.
    pub async fn list(&self, token: &AccessToken, count: usize) -> Result<Vec<Property>, ApiError> {
        let limit = (count > 0).then_some(count);
        let rows = self.call_store(token, StoreRequest::List { limit }).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound("No properties found.".into()));
        }
        Ok(rows)
    }

    pub async fn list_by_user(&self, token: &AccessToken, user_id: &str) -> Result<Vec<Property>, ApiError> {
        let rows = self
            .call_store(token, StoreRequest::ListByUser(user_id.to_string()))
            .await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound("No properties found for requested user.".into()));
        }
        Ok(rows)
    }

    pub async fn update(
        &self,
        token: &AccessToken,
        id: &str,
        patch: PropertyUpdate,
    ) -> Result<Property, ApiError> {
        if patch.is_empty() {
            return Err(ApiError::EmptyUpdate);
        }

        let rows = self
            .call_store(
                token,
                StoreRequest::Update {
                    id: id.to_string(),
                    patch,
                },
            )
            .await?;
        let updated = rows.into_iter().next().ok_or_else(|| not_found_by_id(id))?;

        tracing::info!(property_id = %id, "Property updated");
        Ok(updated)
    }

    pub async fn delete(&self, token: &AccessToken, id: &str) -> Result<Property, ApiError> {
        let rows = self.call_store(token, StoreRequest::Delete(id.to_string())).await?;
        let deleted = rows.into_iter().next().ok_or_else(|| not_found_by_id(id))?;

        tracing::info!(property_id = %id, "Property deleted");
        Ok(deleted)
    }

    async fn call_store(&self, token: &AccessToken, request: StoreRequest) -> Result<Vec<Property>, ApiError> {
        let store = &self.store;
        let request = &request;

        self.store_calls
            .run(request.name(), move || store.execute(token, request))
            .await
            .map_err(ApiError::from)
    }

    async fn enrich(&self, token: &AccessToken, mut property: Property) -> Result<Property, ApiError> {
        let users = &self.users;
        let user_id = property.user_id.as_str();

        let result = self
            .user_calls
            .run("fetch_user", move || users.fetch_user(token, user_id))
            .await;

        match result {
            Ok(user) => {
                property.user_data = Some(user);
                Ok(property)
            }
            Err(e) => match self.enrichment {
                EnrichmentMode::BestEffort => {
                    tracing::warn!(
                        property_id = ?property.id,
                        user_id = %property.user_id,
                        error = %e,
                        "User enrichment failed, returning property without user data"
                    );
                    Ok(property)
                }
                EnrichmentMode::Required => Err(ApiError::NotFoundOrEnrichment(format!(
                    "Property {} found but user data for {} is unavailable: {}",
                    property.id.as_deref().unwrap_or("?"),
                    property.user_id,
                    e
                ))),
            },
        }
    }
}

fn not_found_by_id(id: &str) -> ApiError {
    ApiError::NotFound(format!("No properties found with ID {}.", id))
}
