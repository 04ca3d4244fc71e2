//! Durable credential storage for the storefront session.
//!
//! This crate provides:
//! - A `SecureStorage` key/value trait with file-backed and in-memory backends
//! - `CredentialStore`, the typed API for the identity snapshot and token pair
//! - The `Identity` and `CredentialPair` records

mod file;
mod identity;
mod keys;
mod memory;
mod store;
mod traits;

pub use file::FileStorage;
pub use identity::{CredentialPair, Identity, UserId, ADMIN_ROLE};
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use store::CredentialStore;
pub use traits::SecureStorage;

use std::path::Path;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open a credential store backed by the JSON file at `path`.
pub fn open_credential_store(path: &Path) -> StorageResult<CredentialStore> {
    let storage = FileStorage::open(path)?;
    Ok(CredentialStore::new(Box::new(storage)))
}
