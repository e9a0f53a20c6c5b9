//! Section reordering for Folio
//!
//! Turns a drag gesture over section handles into a single index move on the
//! document store. History is checkpointed before the move so one undo puts
//! the section back.

pub mod controller;
pub mod error;
pub mod geometry;

pub use controller::{DropIndicator, DropOutcome, MoveDirection, ReorderController};
pub use error::{ReorderError, Result};
pub use geometry::{
    destination_index, Axis, DropPosition, HandleGeometry, PointerPosition, SectionBounds,
    StaticGeometry,
};
