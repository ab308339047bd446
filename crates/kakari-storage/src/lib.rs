//! Durable key/value storage for the Kakari client.
//!
//! This crate provides:
//! - **`FileStorage`**: a per-user JSON file, the on-disk stand-in for browser
//!   cookie/local storage
//! - **`MemoryStorage`**: process-local storage for ephemeral sessions and tests
//! - **`SessionTokens`**: the access/refresh token pair on top of either backend

mod file;
mod keys;
mod memory;
mod tokens;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use tokens::SessionTokens;
pub use traits::KeyValueStore;

use std::path::Path;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage at `path`.
pub fn create_storage(path: &Path) -> StorageResult<Box<dyn KeyValueStore>> {
    let storage = FileStorage::open(path)?;
    tracing::debug!(path = %storage.path().display(), "Opened session storage");
    Ok(Box::new(storage))
}
