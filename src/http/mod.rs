//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, path prefix)
//!     → request.rs (request ID, request span, route metrics)
//!     → auth.rs (bearer token required on /properties routes)
//!     → properties::routes (handlers)
//!     → response.rs (errors mapped to status + {"detail": ...})
//!     → Send to client
//! ```

pub mod auth;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorBody};
pub use server::{AppState, HttpServer, StartupError};
