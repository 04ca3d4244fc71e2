//! File-backed storage.
//!
//! All entries live in a single JSON object. Every mutation, batched ones
//! included, is one rewrite of the file through a sibling temp file and an
//! atomic rename, so readers (including a restarted process) only ever
//! observe a complete store.

use crate::{SecureStorage, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable storage backed by a JSON file on disk.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = read_entries(&path)?;

        debug!(
            path = %path.display(),
            entries = entries.len(),
            "Opened file storage"
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to the entries and persist the result. The in-memory view is
    /// only updated once the file write succeeded.
    fn mutate<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> StorageResult<T> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        let out = f(&mut next);
        if next != *entries {
            write_entries(&self.path, &next)?;
            *entries = next;
        }
        Ok(out)
    }
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "Setting value");
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(key = %key, "Deleting value");
        self.mutate(|entries| entries.remove(key).is_some())
    }

    fn set_many(&self, batch: &[(&str, &str)]) -> StorageResult<()> {
        debug!(keys = batch.len(), "Setting values");
        self.mutate(|entries| {
            for (key, value) in batch {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        debug!(keys = keys.len(), "Deleting values");
        self.mutate(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

fn read_entries(path: &Path) -> StorageResult<BTreeMap<String, String>> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(content) => serde_json::from_str(&content).map_err(|e| {
            StorageError::Encoding(format!("{} is not a valid store: {}", path.display(), e))
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json =
        serde_json::to_string_pretty(entries).map_err(|e| StorageError::Encoding(e.to_string()))?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;

    // Tokens are bearer secrets: owner read/write only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}
