//! Authentication error types.

use crate::token::DecodeError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity service refused the username/password pair
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Non-success HTTP status from the identity service
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed bearer token
    #[error("Token decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] kakari_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Client configuration error
    #[error("Config error: {0}")]
    Config(#[from] kakari_config::CoreError),

    /// Token cannot be carried in a header
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Connection failures and timeouts
    /// - HTTP errors with 5xx status codes
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            AuthError::Http { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Http { status, .. } => Some(*status),
            AuthError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
