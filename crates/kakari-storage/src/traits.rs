//! Storage trait definitions.

use crate::StorageResult;

/// Trait for durable key/value backends.
pub trait KeyValueStore: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Store several values in one write; readers see all of them or none.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()>;

    /// Delete several values in one write. Missing keys are not an error.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
