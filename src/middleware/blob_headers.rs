//! Response hardening for blobs served from the local blob root.
//!
//! Uploaded content is user-controlled and served from the application's own
//! origin, so it must never run as a page of this site.

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY, CONTENT_TYPE};
use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Wraps the blob file service.
///
/// - Paths with a dot-prefixed segment (the upload staging area) are 404.
/// - Every response gets `Content-Security-Policy: sandbox`.
/// - Anything but a raster image is sent as `Content-Disposition: attachment`.
pub async fn blob_headers_middleware(req: Request, next: Next) -> Response {
    if has_hidden_segment(req.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("sandbox"));

    let inline = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(is_inline_image);
    if !inline {
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
    }
    res
}

// SVG is markup and may carry script
fn is_inline_image(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence.starts_with("image/") && essence != "image/svg+xml"
}

fn has_hidden_segment(path: &str) -> bool {
    let decoded = urlencoding::decode(path).map(|p| p.into_owned()).unwrap_or_else(|_| path.to_string());
    decoded.split(&['/', '\\'][..]).any(|segment| segment.starts_with('.'))
}
