//! Error types for reordering

use folio_document::DocumentError;
use thiserror::Error;

/// Result type for reorder operations
pub type Result<T> = std::result::Result<T, ReorderError>;

/// Reorder errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReorderError {
    /// The section to drag or move does not exist
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// A drag is already in progress
    #[error("Already dragging section {0}")]
    AlreadyDragging(String),

    /// Drop without a drag in progress
    #[error("No drag in progress")]
    NotDragging,

    /// The store rejected the move
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

impl ReorderError {
    /// Create a section not found error
    pub fn section_not_found(id: impl Into<String>) -> Self {
        ReorderError::SectionNotFound(id.into())
    }
}
