//! Key-value storage backends for client-side state.
//!
//! These play the role a browser's `localStorage` plays for a web client: a flat
//! string-to-string map that survives between requests. The in-memory backend is
//! used by tests and short-lived tools; the file backend persists a session across
//! invocations of the command-line front-end.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage file {path} is not a valid JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage is unavailable")]
    Unavailable,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Flat string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Write several keys. Backends that can commit them in one write override
    /// this; the default goes key by key and may stop partway on error.
    fn set_items(&self, items: &[(&str, &str)]) -> StorageResult<()> {
        for (key, value) in items {
            self.set_item(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys, with the same commit rules as [`KeyValueStore::set_items`]
    fn remove_items(&self, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }
}

/// Process-local storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object file.
///
/// Every mutation rewrites the whole file through a sibling temp file and a rename,
/// so a concurrent reader sees either the old or the new map, never a partial one.
/// A missing file reads as an empty map.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage file `storage.json` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, items: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let json = serde_json::to_vec_pretty(items).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        tmp.write_all(&json).map_err(|e| self.io_err(e))?;
        tmp.sync_all().map_err(|e| self.io_err(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))?;

        debug!("Wrote {} storage keys to {}", items.len(), self.path.display());
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Unavailable)?;
        let mut items = self.load()?;
        f(&mut items);
        self.store(&items)
    }
}

impl KeyValueStore for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn set_items(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        self.update(|items| {
            for (key, value) in pairs {
                items.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_items(&self, keys: &[&str]) -> StorageResult<()> {
        self.update(|items| {
            for key in keys {
                items.remove(*key);
            }
        })
    }
}
