//! Shared default headers for identity service requests.

use crate::AuthResult;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use std::sync::Arc;

/// Default headers applied to every outgoing request.
///
/// Clones share the same map, so the session store can attach a bearer token
/// that the identity client picks up on its next request.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    headers: Arc<RwLock<HeaderMap>>,
}

impl RequestDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    pub fn set_bearer(&self, token: &str) -> AuthResult<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        self.headers.write().insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Remove the `Authorization` header. Returns whether one was present.
    pub fn clear_authorization(&self) -> bool {
        self.headers.write().remove(AUTHORIZATION).is_some()
    }

    /// Current `Authorization` header as text.
    pub fn authorization(&self) -> Option<String> {
        self.headers
            .read()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Snapshot of all default headers.
    pub fn snapshot(&self) -> HeaderMap {
        self.headers.read().clone()
    }

    /// Apply the defaults to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.headers(self.snapshot())
    }
}
