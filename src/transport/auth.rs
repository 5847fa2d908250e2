//! Identity extraction from the host page's cookies.
//!
//! The course site stores a JWT in a `token` cookie. The widget only needs
//! the `sciper` claim (the student id), so the payload is decoded without
//! any signature verification. Anything malformed simply yields no id.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value;

/// Pull the raw JWT out of a `Cookie` header style string.
pub fn token_from_cookies(cookies: &str) -> Option<String> {
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("token="))
        .map(str::to_string)
}

/// Decode the claims object from a JWT without verifying it.
pub fn decode_jwt_claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The `sciper` claim from the `token` cookie, if present. Numeric claims
/// are stringified.
pub fn sciper_from_cookies(cookies: &str) -> Option<String> {
    let token = token_from_cookies(cookies)?;
    let claims = decode_jwt_claims(&token)?;
    match claims.get("sciper")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
