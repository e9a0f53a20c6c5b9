//! Drag gesture state machine

use std::sync::Arc;

use folio_document::{DocumentStore, UiStatePatch};
use folio_undo_redo::HistoryEngine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReorderError, Result};
use crate::geometry::{destination_index, Axis, DropPosition, HandleGeometry, PointerPosition};

/// Where the dragged section would land if released now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndicator {
    /// Section under the pointer
    pub target_id: String,
    /// Side of the target
    pub position: DropPosition,
}

/// Result of a drop or keyboard move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropOutcome {
    /// The section moved from one index to another
    Moved {
        /// Previous index
        from: usize,
        /// New index
        to: usize,
    },
    /// Nothing changed and no history entry was taken
    Unchanged,
}

/// Keyboard move direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    /// Towards index 0
    Up,
    /// Towards the end
    Down,
}

#[derive(Debug)]
enum DragState {
    Idle,
    Dragging {
        section_id: String,
        indicator: Option<DropIndicator>,
    },
}

/// Resets the drag state when dropped, whatever happened in between
struct DragCleanup<'a>(&'a ReorderController);

impl Drop for DragCleanup<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

/// Converts drag gestures into single reorder operations
pub struct ReorderController {
    store: Arc<DocumentStore>,
    history: Arc<HistoryEngine>,
    geometry: Arc<dyn HandleGeometry>,
    axis: Axis,
    state: Mutex<DragState>,
}

impl ReorderController {
    /// Create a controller for a vertical section list
    pub fn new(
        store: Arc<DocumentStore>,
        history: Arc<HistoryEngine>,
        geometry: Arc<dyn HandleGeometry>,
    ) -> Self {
        Self {
            store,
            history,
            geometry,
            axis: Axis::Vertical,
            state: Mutex::new(DragState::Idle),
        }
    }

    /// Use a different layout axis
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Layout axis in use
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        matches!(*self.state.lock(), DragState::Dragging { .. })
    }

    /// Section being dragged
    pub fn dragged_section_id(&self) -> Option<String> {
        match &*self.state.lock() {
            DragState::Dragging { section_id, .. } => Some(section_id.clone()),
            DragState::Idle => None,
        }
    }

    /// Current drop indicator
    pub fn indicator(&self) -> Option<DropIndicator> {
        match &*self.state.lock() {
            DragState::Dragging { indicator, .. } => indicator.clone(),
            DragState::Idle => None,
        }
    }

    /// Pick up section `section_id`
    pub fn begin_drag(&self, section_id: &str) -> Result<()> {
        if self.store.with_state(|doc| doc.index_of(section_id)).is_none() {
            return Err(ReorderError::section_not_found(section_id));
        }

        {
            let mut state = self.state.lock();
            if let DragState::Dragging { section_id, .. } = &*state {
                return Err(ReorderError::AlreadyDragging(section_id.clone()));
            }
            *state = DragState::Dragging {
                section_id: section_id.to_string(),
                indicator: None,
            };
        }

        debug!(section_id, "drag started");
        self.store.set_ui_state(UiStatePatch {
            is_dragging: Some(true),
            dragged_section_id: Some(Some(section_id.to_string())),
            ..UiStatePatch::default()
        });
        Ok(())
    }

    /// Track the pointer over `candidate_id`; the document is not touched
    pub fn update_drag_target(
        &self,
        pointer: PointerPosition,
        candidate_id: &str,
    ) -> Option<DropIndicator> {
        let bounds = self.geometry.bounds(candidate_id);
        let mut state = self.state.lock();
        let DragState::Dragging {
            section_id,
            indicator,
        } = &mut *state
        else {
            return None;
        };

        *indicator = match bounds {
            Some(bounds) if candidate_id != section_id.as_str() => Some(DropIndicator {
                target_id: candidate_id.to_string(),
                position: DropPosition::from_pointer(pointer, &bounds, self.axis),
            }),
            _ => None,
        };
        indicator.clone()
    }

    /// Release over `candidate_id`
    ///
    /// Checkpoints history and moves the section when the drop lands somewhere
    /// new. The drag ends either way.
    pub fn drop(&self, pointer: PointerPosition, candidate_id: &str) -> Result<DropOutcome> {
        let section_id = self.dragged_section_id().ok_or(ReorderError::NotDragging)?;
        let _cleanup = DragCleanup(self);

        if candidate_id == section_id {
            debug!(section_id, "dropped onto itself");
            return Ok(DropOutcome::Unchanged);
        }
        let Some(bounds) = self.geometry.bounds(candidate_id) else {
            debug!(candidate_id, "drop target has no geometry");
            return Ok(DropOutcome::Unchanged);
        };
        let (from, target) = self
            .store
            .with_state(|doc| (doc.index_of(&section_id), doc.index_of(candidate_id)));
        let (Some(from), Some(target)) = (from, target) else {
            debug!(section_id, candidate_id, "drop target no longer exists");
            return Ok(DropOutcome::Unchanged);
        };

        let position = DropPosition::from_pointer(pointer, &bounds, self.axis);
        let to = destination_index(from, target, position);
        if to == from {
            return Ok(DropOutcome::Unchanged);
        }

        self.move_index(from, to)
    }

    /// Abandon the drag without changing the document
    pub fn cancel_drag(&self) {
        if self.is_dragging() {
            debug!("drag cancelled");
            self.reset();
        }
    }

    /// Move a section one step, e.g. from a keyboard shortcut
    pub fn move_section(&self, section_id: &str, direction: MoveDirection) -> Result<DropOutcome> {
        let (index, len) = self
            .store
            .with_state(|doc| (doc.index_of(section_id), doc.sections.len()));
        let from = index.ok_or_else(|| ReorderError::section_not_found(section_id))?;

        let to = match direction {
            MoveDirection::Up if from > 0 => from - 1,
            MoveDirection::Down if from + 1 < len => from + 1,
            _ => return Ok(DropOutcome::Unchanged),
        };
        self.move_index(from, to)
    }

    fn move_index(&self, from: usize, to: usize) -> Result<DropOutcome> {
        self.history.checkpoint();
        self.store.reorder(from, to)?;
        info!(from, to, "section moved");
        Ok(DropOutcome::Moved { from, to })
    }

    fn reset(&self) {
        *self.state.lock() = DragState::Idle;
        self.store.set_ui_state(UiStatePatch {
            is_dragging: Some(false),
            dragged_section_id: Some(None),
            ..UiStatePatch::default()
        });
    }
}

impl std::fmt::Debug for ReorderController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReorderController")
            .field("axis", &self.axis)
            .field("state", &*self.state.lock())
            .finish()
    }
}
