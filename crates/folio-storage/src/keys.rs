//! Well-known storage keys

use serde::{Deserialize, Serialize};

/// Default key for the serialized document
pub const DOCUMENT_KEY: &str = "folio.document";

/// Default key for the serialized undo/redo stacks
pub const HISTORY_KEY: &str = "folio.history";

/// Default key for the last successful save, in epoch milliseconds
pub const LAST_SAVE_KEY: &str = "folio.last_save";

/// The set of keys an editing session persists under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Full document snapshot
    pub document: String,
    /// History stacks
    pub history: String,
    /// Last save timestamp
    pub last_save: String,
}

impl StorageKeys {
    /// Keys namespaced under `prefix`, e.g. `resume-2` → `resume-2.document`
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            document: format!("{prefix}.document"),
            history: format!("{prefix}.history"),
            last_save: format!("{prefix}.last_save"),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            document: DOCUMENT_KEY.to_string(),
            history: HISTORY_KEY.to_string(),
            last_save: LAST_SAVE_KEY.to_string(),
        }
    }
}
