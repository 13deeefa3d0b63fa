//! HTTP route handlers and router assembly.
//!
//! - `home`: the retail pages (index, inserts, uploads, SQL customer list)
//! - `health`: liveness, readiness, metrics and version endpoints

pub mod health;
pub mod home;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware;
use crate::state::AppState;

/// Builds the full application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let mut app = Router::new()
        .route("/", get(home::root))
        .route("/Home", get(home::root))
        .route("/Home/Index", get(home::index))
        .route("/Home/AddTable", post(home::add_table))
        .route("/Home/AddQueue", post(home::add_queue))
        .route("/Home/UploadBlob", post(home::upload_blob))
        .route("/Home/UploadFile", post(home::upload_file))
        .route("/Home/Database", get(home::database))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version));

    // Local blobs are served by this process under the public URL prefix
    let public_url = cfg.storage.blob_public_url.trim_end_matches('/');
    if let Some(root) = state.blobs.local_root() {
        if public_url.starts_with('/') && public_url.len() > 1 {
            let blobs = Router::new()
                .fallback_service(ServeDir::new(root))
                .layer(from_fn(middleware::blob_headers::blob_headers_middleware));
            app = app.nest_service(public_url, blobs);
        }
    }

    app.with_state(state)
        .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}
