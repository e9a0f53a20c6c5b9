//! Error types for autosave

use folio_storage::StorageError;
use thiserror::Error;

/// Reasons a save attempt can fail
#[derive(Debug, Error)]
pub enum AutoSaveError {
    /// The backend rejected the write
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The document could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
