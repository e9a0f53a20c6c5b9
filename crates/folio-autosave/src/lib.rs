//! Background saving for Folio
//!
//! A fixed-period timer writes the live document to durable storage whenever
//! it has changed since the last successful write. Saving is independent of
//! undo history: a save never creates or consumes a history entry.

pub mod error;
pub mod scheduler;

pub use error::AutoSaveError;
pub use scheduler::{
    AutoSaveScheduler, SaveOutcome, DEFAULT_AUTOSAVE_INTERVAL, MIN_AUTOSAVE_INTERVAL,
};
