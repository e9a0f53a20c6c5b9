#![warn(missing_docs)]

//! Undo/Redo history for Folio
//!
//! Keeps two bounded stacks of whole-document [`Snapshot`]s fed by the
//! document store's `Modified` notifications. Bursts of edits are debounced
//! into a single entry; structural operations take an explicit checkpoint.
//! Restores run behind a reentrancy guard so they never record themselves.

pub mod error;
pub mod history;
pub mod persistence;
pub mod snapshot;

// Re-export public API
pub use error::UndoRedoError;
pub use history::{HistoryConfig, HistoryEngine, HistoryEntry};
pub use persistence::{HistorySnapshot, HistoryStore, PersistReport};
pub use snapshot::Snapshot;
