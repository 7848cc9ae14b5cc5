//! Shared-secret authorization for inbound requests.

use crate::error::AuthError;
use hyper::header::{HeaderMap, AUTHORIZATION};

/// Check the inbound `Authorization` header against the global token.
///
/// With no global token every request passes. Otherwise the header must be
/// exactly `Bearer <token>`.
pub fn authorize(headers: &HeaderMap, global_token: Option<&str>) -> Result<(), AuthError> {
    let Some(token) = global_token else {
        return Ok(());
    };

    let presented = headers
        .get(AUTHORIZATION)
        .map(|v| v.as_bytes())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::Missing)?;

    match presented.strip_prefix(b"Bearer ") {
        Some(candidate) if candidate == token.as_bytes() => Ok(()),
        _ => Err(AuthError::Mismatch),
    }
}
