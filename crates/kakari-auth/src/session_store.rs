//! Persisted session tokens and the request credential they back.

use crate::http::RequestDefaults;
use crate::AuthResult;
use kakari_storage::{KeyValueStore, SessionTokens, StorageResult};
use tracing::debug;

/// Durable token pair plus the bearer header on outgoing requests.
///
/// The two are owned together so that a cleared session never leaves a stale
/// credential behind on the request defaults, provided callers go through
/// [`SessionStore::clear`] followed by [`SessionStore::detach_from_requests`].
pub struct SessionStore {
    tokens: SessionTokens,
    defaults: RequestDefaults,
}

impl SessionStore {
    pub fn new(storage: Box<dyn KeyValueStore>, defaults: RequestDefaults) -> Self {
        Self {
            tokens: SessionTokens::new(storage),
            defaults,
        }
    }

    /// Store the token pair in one write.
    pub fn persist(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        self.tokens.set_session(access_token, refresh_token)?;
        debug!("Persisted session tokens");
        Ok(())
    }

    /// Remove the token pair. Clearing an empty store succeeds.
    pub fn clear(&self) -> StorageResult<()> {
        self.tokens.clear_session()?;
        debug!("Cleared session tokens");
        Ok(())
    }

    pub fn current_access_token(&self) -> StorageResult<Option<String>> {
        self.tokens.access_token()
    }

    pub fn current_refresh_token(&self) -> StorageResult<Option<String>> {
        self.tokens.refresh_token()
    }

    /// Present `token` as the bearer credential on subsequent requests.
    pub fn attach_to_requests(&self, token: &str) -> AuthResult<()> {
        self.defaults.set_bearer(token)
    }

    /// Stop sending a bearer credential.
    pub fn detach_from_requests(&self) {
        if self.defaults.clear_authorization() {
            debug!("Detached bearer credential from requests");
        }
    }

    /// The request defaults this store writes to.
    pub fn request_defaults(&self) -> &RequestDefaults {
        &self.defaults
    }
}
