//! Integration and unit tests for the ABC Retail application.
//!
//! - **support**: test doubles (call-counting and failing stores) and request helpers
//! - **home_api_tests**: index refresh, inserts, queue and upload routes
//! - **storage_tests**: SQLite, filesystem and in-memory storage drivers
//! - **db_tests**: relational reader and pool setup
//! - **config_tests**: configuration defaults and validation
//! - **error_tests**: error mapping and error pages
//! - **health_api_tests**: health, metrics, version and security headers
//!
//! Run a single module with e.g. `cargo test home_api_tests`.

pub mod support;

pub mod storage_tests;
