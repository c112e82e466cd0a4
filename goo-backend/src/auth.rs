//! HTTP basic authentication for the admin and metrics endpoints.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ApiError;

/// User name expected on `/metrics`.
pub const METRICS_USER: &str = "metrics";
/// User name expected on `/migrate/*`.
pub const ADMIN_USER: &str = "admin";

/// Decode a `Basic` authorization header into user and password.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

/// Require `user` with `password`. Without a configured password every
/// request is rejected.
pub fn require_basic_auth(
    headers: &HeaderMap,
    user: &str,
    password: Option<&str>,
) -> Result<(), ApiError> {
    let Some(expected) = password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::Unauthorized);
    };
    match basic_credentials(headers) {
        Some((u, p)) if u == user && p == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
