//! Immutable document snapshots

use chrono::{DateTime, Utc};
use folio_document::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UndoRedoError;

/// A point-in-time copy of the whole document
///
/// The copy is owned, so later edits to the live document cannot reach it,
/// and there is no way to mutate it after capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    id: String,
    timestamp: DateTime<Utc>,
    document: Document,
}

impl Snapshot {
    /// Capture `document`
    pub fn capture(document: Document) -> Self {
        Snapshot {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            document,
        }
    }

    /// Unique identifier for this snapshot
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the snapshot was taken
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The captured document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Whether two snapshots hold the same user content
    pub fn content_eq(&self, other: &Document) -> bool {
        self.document.content_eq(other)
    }

    /// Validate the snapshot before it is re-applied
    pub fn validate(&self) -> Result<(), UndoRedoError> {
        if self.id.is_empty() {
            return Err(UndoRedoError::validation_error("snapshot id cannot be empty"));
        }
        self.document.validate().map_err(|e| {
            UndoRedoError::validation_error(format!("snapshot {}: {}", self.id, e))
        })
    }
}
