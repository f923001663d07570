//! Property listing service library.

pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod properties;
pub mod resilience;
pub mod upstream;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use properties::PropertyService;
