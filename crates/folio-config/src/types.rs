//! Configuration types and defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for an editing session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FolioConfig {
    /// Undo/redo history
    pub history: HistorySettings,
    /// Background persistence
    pub autosave: AutoSaveSettings,
    /// Durable storage backend
    pub storage: StorageSettings,
    /// Log output
    pub logging: LoggingSettings,
}

/// Undo/redo history configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of undo entries kept
    pub max_entries: usize,
    /// Quiet period after the last edit before a history entry is captured
    pub debounce_ms: u64,
    /// Whether the stacks are written to durable storage
    pub persist: bool,
}

impl HistorySettings {
    /// Debounce window as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_entries: 50,
            debounce_ms: 500,
            persist: true,
        }
    }
}

/// Autosave configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoSaveSettings {
    /// Whether the periodic timer starts with the session
    pub enabled: bool,
    /// Seconds between autosave ticks
    pub interval_secs: u64,
}

impl AutoSaveSettings {
    /// Tick period as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, process-local storage
    #[default]
    Memory,
    /// One file per key under `storage.path`
    File,
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend kind
    pub backend: StorageBackend,
    /// Directory for the file backend
    pub path: Option<PathBuf>,
    /// Optional byte quota
    pub quota_bytes: Option<usize>,
    /// Prefix for the document, history and last-save keys
    pub key_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            quota_bytes: None,
            key_prefix: "folio".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
