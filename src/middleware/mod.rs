//! Middleware components for HTTP request processing.
//!
//! Cross-cutting response handling layered onto the router in
//! [`crate::routes::router`].

pub mod blob_headers;
pub mod security_headers;
