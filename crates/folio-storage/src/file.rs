//! Directory-backed storage backend
//!
//! Each key is stored as `<root>/<key>.json`. Writes go to a temporary file that
//! is renamed over the target, so a crash mid-write never leaves a torn value.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IoOperation, StorageError, StorageResult};
use crate::KeyValueStore;

const EXTENSION: &str = "json";

/// Key-value store persisted as one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota: None,
        }
    }

    /// Limit the total size of all stored values to `quota` bytes
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::invalid_key(key, "key cannot be empty"));
        }
        if key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::invalid_key(
                key,
                "key must be a plain file name",
            ));
        }
        Ok(self.root.join(format!("{key}.{EXTENSION}")))
    }

    /// Total bytes stored, excluding the file at `skip`
    fn usage_excluding(&self, skip: &Path) -> StorageResult<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::io_error(
                    self.root.clone(),
                    IoOperation::Read,
                    e,
                ))
            }
        };

        let mut total = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                total += meta.len() as usize;
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io_error(path, IoOperation::Read, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;

        if let Some(limit) = self.quota {
            let required = self.usage_excluding(&path)? + value.len();
            if required > limit {
                return Err(StorageError::quota_exceeded(key, required, limit));
            }
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::io_error(self.root.clone(), IoOperation::Write, e))?;

        // Write to temp file first
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)
            .map_err(|e| StorageError::io_error(temp_path.clone(), IoOperation::Write, e))?;

        // Rename atomically
        fs::rename(&temp_path, &path)
            .map_err(|e| StorageError::io_error(path.clone(), IoOperation::Move, e))?;

        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_error(path, IoOperation::Delete, e)),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::io_error(
                    self.root.clone(),
                    IoOperation::Read,
                    e,
                ))
            }
        };

        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                    return None;
                }
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}
