//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the dependency clients and the property service from config
//! - Create the Axum router with all handlers
//! - Wire up middleware (auth, request ID, tracing, timeout, CORS, metrics)
//! - Mount property routes under the deployment path prefix
//! - Serve until the shutdown channel fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    BoxError, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ServerConfig, ServiceConfig};
use crate::events::{EventPublisher, HttpEventSink};
use crate::http::auth::require_bearer;
use crate::http::response::ApiError;
use crate::http::request::{
    make_request_span, propagate_request_id_layer, set_request_id_layer, track_metrics,
};
use crate::observability::metrics;
use crate::properties::{routes, PropertyService};
use crate::upstream::{HttpUserDirectory, RestPropertyStore};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PropertyService>,
    pub metrics: PrometheusHandle,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid {what} URL: {source}")]
    Url {
        what: &'static str,
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the property service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    metrics: PrometheusHandle,
}

impl HttpServer {
    /// Create a server talking to the dependencies named in `config`.
    pub fn new(config: ServiceConfig) -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let store = RestPropertyStore::new(client.clone(), &config.store)
            .map_err(|source| StartupError::Url { what: "store", source })?;
        let users = HttpUserDirectory::new(client.clone(), &config.users)
            .map_err(|source| StartupError::Url { what: "user service", source })?;

        let events = match &config.events.broker_url {
            Some(broker_url) => {
                let sink = HttpEventSink::new(client, broker_url, &config.events.topic)
                    .map_err(|source| StartupError::Url { what: "event broker", source })?;
                EventPublisher::new(
                    Arc::new(sink),
                    Duration::from_millis(config.events.publish_timeout_ms),
                )
            }
            None => {
                tracing::warn!("No event broker configured, view events will be dropped");
                EventPublisher::disabled()
            }
        };

        let service = PropertyService::from_config(&config, Arc::new(store), Arc::new(users), events);
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Create a server around an already wired service.
    pub fn with_service(config: ServiceConfig, service: Arc<PropertyService>) -> Self {
        let metrics = metrics::init_metrics();
        let state = AppState {
            service,
            metrics: metrics.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            metrics,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let properties = routes::router().route_layer(middleware::from_fn(require_bearer));

        let prefix = config.server.mode.path_prefix();
        let api = if prefix.is_empty() {
            properties
        } else {
            Router::new().nest(prefix, properties)
        };

        let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .merge(api)
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(propagate_request_id_layer())
                    .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                        middleware_error(err, request_timeout)
                    }))
                    .timeout(request_timeout),
            );

        match cors_layer(&config.server) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires or its sender is dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.config.server.mode,
            prefix = self.config.server.mode.path_prefix(),
            "HTTP server starting"
        );

        let handle = self.metrics.clone();
        let mut upkeep_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => handle.run_upkeep(),
                    _ = upkeep_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Requests cut off by the whole-request timeout surface as 503 with a
/// JSON body, like any other degraded-dependency error.
fn middleware_error(err: BoxError, request_timeout: Duration) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::ServiceUnavailable(format!(
            "request did not complete within {}s",
            request_timeout.as_secs()
        ))
    } else {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_allowed_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_request_maps_to_service_unavailable() {
        let err = middleware_error(Box::new(Elapsed::new()), Duration::from_secs(40));
        assert_eq!(
            err,
            ApiError::ServiceUnavailable("request did not complete within 40s".into())
        );
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_cors_disabled_without_origins() {
        assert!(cors_layer(&ServerConfig::default()).is_none());

        let config = ServerConfig {
            cors_allowed_origins: vec!["https://app.example.com".into()],
            ..ServerConfig::default()
        };
        assert!(cors_layer(&config).is_some());
    }
}
