//! Bearer token decoding.
//!
//! Tokens are JWTs issued by the identity service. Only the payload is read:
//! the signature is not checked here, so a live token is not proof of
//! authenticity. The service re-validates the token on every protected request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problems found while decoding a token.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not `header.payload.signature`
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    /// Payload segment is not base64url
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Payload is not JSON
    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload JSON is not an object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// No `exp` claim
    #[error("missing exp claim")]
    MissingExpiry,

    /// `exp` is not a number of seconds
    #[error("invalid exp claim: {0}")]
    InvalidExpiry(String),
}

/// Claims read from a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id), when present.
    pub sub: Option<String>,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// True iff the token has not expired yet (`exp > now`).
    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now().timestamp())
    }

    /// Liveness against an explicit Unix timestamp in seconds.
    pub fn is_live_at(&self, now: i64) -> bool {
        self.exp > now
    }

    /// Seconds until expiry; zero or negative once expired.
    pub fn seconds_remaining(&self) -> i64 {
        self.exp - Utc::now().timestamp()
    }
}

/// Decode the payload of `token` without verifying its signature.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let exp = match object.get("exp") {
        None | Some(serde_json::Value::Null) => return Err(DecodeError::MissingExpiry),
        Some(raw) => parse_expiry(raw)?,
    };

    let sub = match object.get("sub") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    Ok(Claims { sub, exp })
}

/// Decode `token` and report whether it is live. Malformed tokens are not live.
pub fn is_live(token: &str) -> bool {
    match decode(token) {
        Ok(claims) => claims.is_live(),
        Err(e) => {
            tracing::debug!(error = %e, "Treating malformed token as expired");
            false
        }
    }
}

fn parse_expiry(raw: &serde_json::Value) -> Result<i64, DecodeError> {
    if let Some(secs) = raw.as_i64() {
        return Ok(secs);
    }
    match raw.as_f64() {
        Some(secs) if secs.is_finite() => Ok(secs.floor() as i64),
        _ => Err(DecodeError::InvalidExpiry(raw.to_string())),
    }
}

/// Build an unsigned token with the given payload, for tests across the crate.
#[cfg(test)]
pub(crate) fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

/// Token for `sub` expiring `offset_secs` from now.
#[cfg(test)]
pub(crate) fn token_expiring_in(sub: &str, offset_secs: i64) -> String {
    encode_unsigned(&serde_json::json!({
        "sub": sub,
        "exp": Utc::now().timestamp() + offset_secs,
    }))
}
