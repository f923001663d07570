//! Startup orchestration.
//!
//! # Responsibilities
//! - Build clients and the HTTP server from validated configuration
//! - Bind the listener
//! - Serve until a termination signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, so traffic only arrives once the server is built

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::{HttpServer, StartupError};
use crate::lifecycle::Shutdown;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the service until SIGINT/SIGTERM.
pub async fn launch(config: ServiceConfig) -> Result<(), LaunchError> {
    let address = config.server.bind_address();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| LaunchError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(LaunchError::Serve)
}
