//! # ABC Retail
//!
//! A small web front-end that exercises four storage backends: a table store
//! for customer/product rows, a message queue for orders, two blob containers
//! for images and files, and a relational database with a customer list.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, forms, multipart uploads
//! - **SQLx**: SQLite drivers for the table and queue stores and the relational reader
//! - **Tokio**: async runtime and filesystem access for the blob store
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (defaults, file, environment)
//! - [`db`]: SQLite pools and the relational customer reader
//! - [`error`]: application error type rendered as HTML error pages
//! - [`metrics`]: request and backend counters
//! - [`middleware`]: security headers
//! - [`routes`]: page handlers, health endpoints, router assembly
//! - [`state`]: backend handles shared across requests
//! - [`storage`]: table, queue and blob traits with their drivers
//! - [`types`]: view models and form inputs
//! - [`views`]: HTML rendering

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;
pub mod types;
pub mod views;

#[cfg(test)]
mod tests;
