//! Error types for the undo/redo system

use folio_document::DocumentError;
use thiserror::Error;

/// Errors that can occur in the undo/redo system
#[derive(Debug, Error)]
pub enum UndoRedoError {
    /// Timeline position does not exist
    #[error("History index {index} out of range (last position is {max})")]
    IndexOutOfRange {
        /// Requested position
        index: usize,
        /// Highest valid position
        max: usize,
    },

    /// Snapshot failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage error
    #[error("Storage error: {0}")]
    StorageError(#[from] folio_storage::StorageError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl UndoRedoError {
    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl From<DocumentError> for UndoRedoError {
    fn from(err: DocumentError) -> Self {
        Self::ValidationError(err.to_string())
    }
}
