//! Property listings: records, operations and HTTP handlers.
//!
//! # Data Flow
//! ```text
//! routes.rs (extract token, path, body)
//!     → service.rs (validate, call store, enrich, publish view event)
//!     → model.rs (wire shape of records and patches)
//! ```

pub mod model;
pub mod routes;
pub mod service;

pub use model::{Property, PropertyUpdate};
pub use service::PropertyService;
