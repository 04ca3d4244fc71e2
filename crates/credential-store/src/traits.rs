//! Storage trait definitions.

use crate::StorageResult;

/// Trait for durable key/value backends
pub trait SecureStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Store several values at once. Either every entry is written or none is.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()>;

    /// Delete several keys at once. Either every key is removed or none is.
    /// Missing keys are ignored.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
