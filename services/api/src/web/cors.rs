//! services/api/src/web/cors.rs
//!
//! Cross-origin headers for the chat endpoint. The allowed origin is a
//! single configured value echoed on every response; the preflight
//! handler answers with the full header set only for genuine preflight
//! requests (all three CORS request headers present).

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
pub const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Headers attached to every non-preflight response from the chat endpoint.
pub fn response_headers(origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        origin,
    );
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_METHODS,
        ALLOWED_METHODS,
    );
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        ALLOWED_HEADERS,
    );
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        "true",
    );
    insert(&mut headers, header::VARY, "origin");
    headers
}

/// Headers for a successful preflight response.
pub fn preflight_headers(origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        origin,
    );
    insert(&mut headers, header::ACCESS_CONTROL_ALLOW_METHODS, "POST");
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        ALLOWED_HEADERS,
    );
    insert(
        &mut headers,
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        "true",
    );
    insert(
        &mut headers,
        header::ACCESS_CONTROL_MAX_AGE,
        PREFLIGHT_MAX_AGE_SECS,
    );
    headers
}

/// A request counts as a preflight only when all three request headers
/// are present.
pub fn is_preflight(request_headers: &HeaderMap) -> bool {
    request_headers.contains_key(header::ORIGIN)
        && request_headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
        && request_headers.contains_key(header::ACCESS_CONTROL_REQUEST_HEADERS)
}
