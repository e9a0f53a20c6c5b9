//! Durable storage for the undo/redo stacks

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use folio_storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UndoRedoError;
use crate::snapshot::Snapshot;

/// Stored form of the history stacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Undo entries, oldest first
    pub undo_stack: Vec<Snapshot>,
    /// Redo entries, most recently undone last
    pub redo_stack: Vec<Snapshot>,
    /// When the stacks were written
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct HistoryPayload<'a> {
    undo_stack: &'a VecDeque<Snapshot>,
    redo_stack: &'a [Snapshot],
    timestamp: DateTime<Utc>,
}

/// How a successful write went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistReport {
    /// Written on the first attempt
    Written,
    /// Written after shedding history to get under the storage quota
    Recovered {
        /// Oldest undo entries discarded
        dropped_undo: usize,
        /// Redo entries discarded
        dropped_redo: usize,
    },
}

/// Reads and writes the history stacks under one storage key
#[derive(Debug, Clone)]
pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl HistoryStore {
    /// Create a store writing to `key`
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Storage key in use
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write both stacks
    ///
    /// When the backend reports [`StorageError::QuotaExceeded`], the oldest half
    /// of `undo` and all of `redo` are discarded in place and the write is
    /// retried once. A second failure is returned to the caller.
    pub fn save(
        &self,
        undo: &mut VecDeque<Snapshot>,
        redo: &mut Vec<Snapshot>,
    ) -> Result<PersistReport, UndoRedoError> {
        match self.write(undo, redo) {
            Ok(()) => Ok(PersistReport::Written),
            Err(UndoRedoError::StorageError(StorageError::QuotaExceeded {
                required, limit, ..
            })) => {
                let dropped_undo = undo.len() / 2;
                undo.drain(..dropped_undo);
                let dropped_redo = redo.len();
                redo.clear();
                warn!(
                    key = %self.key,
                    required,
                    limit,
                    dropped_undo,
                    dropped_redo,
                    "history storage full, truncating and retrying"
                );

                self.write(undo, redo)?;
                Ok(PersistReport::Recovered {
                    dropped_undo,
                    dropped_redo,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, undo: &VecDeque<Snapshot>, redo: &[Snapshot]) -> Result<(), UndoRedoError> {
        let payload = HistoryPayload {
            undo_stack: undo,
            redo_stack: redo,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&payload)?;
        self.storage.set(&self.key, &json)?;
        debug!(key = %self.key, undo = undo.len(), redo = redo.len(), bytes = json.len(), "history persisted");
        Ok(())
    }

    /// Read the stored stacks, if any
    pub fn load(&self) -> Result<Option<HistorySnapshot>, UndoRedoError> {
        match self.storage.get(&self.key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete the stored stacks
    pub fn clear(&self) -> Result<(), UndoRedoError> {
        self.storage.remove(&self.key)?;
        Ok(())
    }
}
