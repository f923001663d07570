//! Property listing service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (request ID, trace, timeout, CORS, auth, metrics)
//!                        │
//!                        ▼
//!                     properties::routes ──▶ properties::service
//!                                                │        │        │
//!                                   ┌────────────┘        │        └───────────┐
//!                                   ▼                     ▼                    ▼
//!                            resilience (store)   resilience (users)    events (detached)
//!                            breaker→retry→timeout breaker→retry→timeout      │
//!                                   │                     │                    ▼
//!                                   ▼                     ▼              message bus
//!                            PostgREST store         user service
//! ```

use std::path::PathBuf;

use clap::Parser;

use property_managing::config::load_config;
use property_managing::lifecycle::launch;
use property_managing::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "property-managing")]
#[command(about = "Property listing CRUD service", long_about = None)]
struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(short, long, env = "PROPERTY_MANAGING_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address(),
        mode = ?config.server.mode,
        store = %config.store.url,
        user_service = %config.users.base_url,
        events_enabled = config.events.broker_url.is_some(),
        "Configuration loaded"
    );

    launch(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
