//! Error types for the document store

use thiserror::Error;

/// Errors returned by [`crate::DocumentStore`] and [`crate::Document::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// No section with this id
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// Index outside the section list; always a caller bug
    #[error("Section index {index} out of range for {len} sections")]
    IndexOutOfRange {
        /// Offending index
        index: usize,
        /// Number of sections at the time of the call
        len: usize,
    },

    /// A section has no id
    #[error("Section at index {0} has an empty id")]
    EmptySectionId(usize),

    /// Two sections share an id
    #[error("Duplicate section id: {0}")]
    DuplicateSectionId(String),

    /// `active_section_id` names a section that does not exist
    #[error("Active section {0} does not exist")]
    DanglingActiveSection(String),
}

impl DocumentError {
    /// Create a new SectionNotFound error
    pub fn section_not_found(id: impl Into<String>) -> Self {
        Self::SectionNotFound(id.into())
    }
}
