//! Bearer token authentication for the send endpoints.
//!
//! Requests carry `Authorization: Bearer <WEBHOOK_SECRET>`. When no secret is
//! configured every authenticated request is refused.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::warn;

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Check the request against the configured secret.
pub fn is_authorized(secret: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        warn!("webhook_secret_not_configured");
        return false;
    };

    match bearer_token(headers) {
        Some(token) => constant_time_compare(token, secret),
        None => false,
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
