use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::MappingError;

/// Key-value memoization store for the resolved converter table.
///
/// Values are JSON documents. Callers invalidate entries when the converter
/// catalog changes; the registry also checks the recorded catalog listing.
pub trait MemoStore: Send + Sync {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), MappingError>;
    fn remove(&self, key: &str) -> Result<(), MappingError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoStore for InMemoryStore {
    fn has(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), MappingError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MappingError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry inside a directory. Survives restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if missing) the cache directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MappingError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| MappingError::Cache(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Bytes outside `[A-Za-z0-9_-]` are written as `.xx` hex, so distinct
    /// keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                file.push(char::from(byte));
            } else {
                file.push_str(&format!(".{byte:02x}"));
            }
        }
        self.dir.join(format!("{file}.json"))
    }
}

impl MemoStore for FileStore {
    fn has(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, value: String) -> Result<(), MappingError> {
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .map_err(|e| MappingError::Cache(format!("{}: {e}", path.display())))
    }

    fn remove(&self, key: &str) -> Result<(), MappingError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MappingError::Cache(e.to_string())),
        }
    }
}
