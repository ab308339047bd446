//! High-level API for the persisted session tokens.

use crate::{KeyValueStore, StorageKeys, StorageResult};

/// Reads and writes the `{accessToken, refreshToken}` pair as a unit.
pub struct SessionTokens {
    storage: Box<dyn KeyValueStore>,
}

impl SessionTokens {
    /// Create a new token manager over the given storage backend
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Store both tokens in a single write.
    pub fn set_session(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        self.storage.set_many(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
        ])
    }

    /// Remove both tokens. Succeeds when nothing was stored.
    pub fn clear_session(&self) -> StorageResult<()> {
        self.storage.delete_many(&StorageKeys::SESSION)
    }

    /// Retrieve the access token
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Retrieve the refresh token
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }
}
