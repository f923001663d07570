//! HTTP handlers for `/properties`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::properties::model::{Property, PropertyUpdate};
use crate::upstream::AccessToken;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Maximum number of rows; absent or `0` means all.
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub detail: String,
    pub property: Property,
}

/// Routes relative to the deployment prefix. Callers add the auth layer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route(
            "/properties/{id}",
            get(get_property).put(update_property).delete(delete_property),
        )
        .route("/properties/{id}/{user_id}", get(get_property_for_viewer))
        .route("/properties/user/{user_id}", get(list_user_properties))
}

async fn create_property(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    payload: Result<Json<Property>, JsonRejection>,
) -> Result<Json<Property>, ApiError> {
    let Json(property) = payload.map_err(bad_body)?;
    state.service.create(&token, property).await.map(Json)
}

async fn list_properties(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Property>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    state.service.list(&token, params.count).await.map(Json)
}

async fn get_property(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(id): Path<String>,
) -> Result<Json<Property>, ApiError> {
    state.service.get(&token, &id).await.map(Json)
}

async fn get_property_for_viewer(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path((id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Property>, ApiError> {
    state
        .service
        .get_for_viewer(&token, &id, &user_id, request_id(&headers))
        .await
        .map(Json)
}

async fn list_user_properties(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Property>>, ApiError> {
    state.service.list_by_user(&token, &user_id).await.map(Json)
}

async fn update_property(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(id): Path<String>,
    payload: Result<Json<PropertyUpdate>, JsonRejection>,
) -> Result<Json<Property>, ApiError> {
    let Json(patch) = payload.map_err(bad_body)?;
    state.service.update(&token, &id, patch).await.map(Json)
}

async fn delete_property(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let property = state.service.delete(&token, &id).await?;
    Ok(Json(DeleteResponse {
        detail: format!("Property with ID {} deleted.", id),
        property,
    }))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}
