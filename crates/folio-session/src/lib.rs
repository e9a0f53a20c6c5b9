//! Folio editing session
//!
//! Builds the document store, history engine, reorder controller and autosave
//! scheduler from a [`FolioConfig`](folio_config::FolioConfig) and a storage
//! backend, restores persisted state on open and flushes it on close.

pub mod error;
pub mod session;

pub use error::{Result, SessionError};
pub use session::EditorSession;
