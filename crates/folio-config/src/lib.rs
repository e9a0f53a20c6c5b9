//! Folio Configuration
//!
//! Layered configuration for an editing session (TOML file, then `FOLIO_*`
//! environment variables) and the tracing subscriber setup shared by hosts.

pub mod error;
pub mod logging;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{
    AutoSaveSettings, FolioConfig, HistorySettings, LoggingSettings, StorageBackend,
    StorageSettings,
};
