#![warn(missing_docs)]

//! Document state for the Folio résumé editor
//!
//! [`DocumentStore`] is the sole owner of the live [`Document`]. Every write goes
//! through its mutation API, and every mutation is announced on a typed,
//! synchronous [`EventBus`] so history, autosave and rendering layers can react
//! uniformly.

pub mod error;
pub mod events;
pub mod model;
pub mod store;

// Re-export public API
pub use error::DocumentError;
pub use events::{DocumentEvent, EventBus, EventKind, SaveTarget, SubscriptionId};
pub use model::{
    Customization, Document, EditorMode, Metadata, SaveStatus, Section, SectionContent,
    SectionPatch, UiState, UiStatePatch,
};
pub use store::DocumentStore;
