//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::types::{FolioConfig, StorageBackend};

/// Loads, validates and saves [`FolioConfig`]
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "FOLIO".to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: "FOLIO".to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path of the TOML file this manager reads and writes
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio")
            .join("config.toml")
    }

    /// Load the file (if present) layered under environment overrides, then validate
    ///
    /// Environment keys use `_` after the prefix and `__` between sections,
    /// e.g. `FOLIO_AUTOSAVE__INTERVAL_SECS=60`.
    pub fn load(&self) -> Result<FolioConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: FolioConfig = builder.build()?.try_deserialize()?;
        self.validate(&config)?;
        debug!(path = %self.config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write `config` as TOML to the manager's path
    pub fn save(&self, config: &FolioConfig) -> Result<()> {
        self.validate(config)?;
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }

    /// Reject configurations no session can run with
    pub fn validate(&self, config: &FolioConfig) -> Result<()> {
        if config.history.max_entries == 0 {
            return Err(ConfigError::validation(
                "history.max_entries must be greater than 0",
            ));
        }
        if config.storage.backend == StorageBackend::File && config.storage.path.is_none() {
            return Err(ConfigError::validation(
                "storage.path is required for the file backend",
            ));
        }
        if config.storage.key_prefix.is_empty() {
            return Err(ConfigError::validation(
                "storage.key_prefix cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
