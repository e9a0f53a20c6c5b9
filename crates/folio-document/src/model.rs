//! Document data model

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DocumentError;

/// Opaque section body; the core never looks inside
pub type SectionContent = Map<String, Value>;

/// Opaque style parameters (colors, fonts, spacing), passed through untouched
pub type Customization = Map<String, Value>;

/// How the editor presents the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    /// Form editing only
    #[default]
    Edit,
    /// Rendered output only
    Preview,
    /// Editor and preview side by side
    Split,
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorMode::Edit => write!(f, "edit"),
            EditorMode::Preview => write!(f, "preview"),
            EditorMode::Split => write!(f, "split"),
        }
    }
}

/// Persistence state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Durable copy matches the live document
    #[default]
    Saved,
    /// A write is in flight
    Saving,
    /// The live document has changes not yet persisted
    Unsaved,
}

/// One reorderable content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique identifier; empty means "assign one on insert"
    #[serde(default)]
    pub id: String,
    /// Section type, e.g. `experience` or `education`
    #[serde(rename = "type")]
    pub kind: String,
    /// Section body
    #[serde(default)]
    pub content: SectionContent,
}

impl Section {
    /// Create a section without an id; the store assigns one on insert
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind: kind.into(),
            content: Map::new(),
        }
    }

    /// Create a section with an explicit id
    pub fn with_id(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            content: Map::new(),
        }
    }

    /// Set a content field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(key.into(), value.into());
        self
    }

    /// Generate a fresh section id
    pub fn generate_id() -> String {
        format!("section-{}", uuid::Uuid::new_v4().simple())
    }
}

/// Partial update for a section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionPatch {
    /// Replacement section type
    pub kind: Option<String>,
    /// Content keys to insert or overwrite
    pub content: Option<SectionContent>,
}

impl SectionPatch {
    /// Patch a single content field
    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut content = Map::new();
        content.insert(key.into(), value.into());
        Self {
            kind: None,
            content: Some(content),
        }
    }
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Résumé title
    pub title: String,
    /// Time of the last content change
    pub last_modified: DateTime<Utc>,
    /// Incremented on every content change
    pub version: u64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            last_modified: Utc::now(),
            version: 0,
        }
    }
}

/// Session-local presentation flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    /// Sidebar visibility
    pub sidebar_open: bool,
    /// Preview pane visibility
    pub preview_visible: bool,
    /// A section handle is being dragged
    pub is_dragging: bool,
    /// The section being dragged
    pub dragged_section_id: Option<String>,
    /// Persistence indicator
    pub save_status: SaveStatus,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            preview_visible: true,
            is_dragging: false,
            dragged_section_id: None,
            save_status: SaveStatus::Saved,
        }
    }
}

/// Partial update for [`UiState`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiStatePatch {
    /// New sidebar visibility
    pub sidebar_open: Option<bool>,
    /// New preview visibility
    pub preview_visible: Option<bool>,
    /// New dragging flag
    pub is_dragging: Option<bool>,
    /// `Some(None)` clears the dragged section
    pub dragged_section_id: Option<Option<String>>,
    /// New save status
    pub save_status: Option<SaveStatus>,
}

impl UiStatePatch {
    /// Patch that only changes the save status
    pub fn save_status(status: SaveStatus) -> Self {
        Self {
            save_status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, ui: &mut UiState) {
        if let Some(v) = self.sidebar_open {
            ui.sidebar_open = v;
        }
        if let Some(v) = self.preview_visible {
            ui.preview_visible = v;
        }
        if let Some(v) = self.is_dragging {
            ui.is_dragging = v;
        }
        if let Some(v) = self.dragged_section_id {
            ui.dragged_section_id = v;
        }
        if let Some(v) = self.save_status {
            ui.save_status = v;
        }
    }
}

/// The single editable aggregate
///
/// `Clone` produces a fully independent deep copy: every field is owned, so a
/// clone shares no mutable structure with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Sections in rendering order
    pub sections: Vec<Section>,
    /// Section currently focused in the editor
    pub active_section_id: Option<String>,
    /// Presentation mode
    pub editor_mode: EditorMode,
    /// Template identifier
    pub template: String,
    /// Style parameters
    #[serde(default)]
    pub customization: Customization,
    /// Title, timestamps and version
    pub metadata: Metadata,
    /// Presentation flags
    #[serde(default)]
    pub ui_state: UiState,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            active_section_id: None,
            editor_mode: EditorMode::Edit,
            template: "classic".to_string(),
            customization: Map::new(),
            metadata: Metadata::default(),
            ui_state: UiState::default(),
        }
    }
}

impl Document {
    /// Create an empty document with the given sections
    pub fn with_sections(sections: Vec<Section>) -> Self {
        Self {
            sections,
            ..Self::default()
        }
    }

    /// Position of the section with `id`
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    /// Section with `id`
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Section ids in order
    pub fn section_ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }

    /// Check the structural invariants
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = HashSet::with_capacity(self.sections.len());
        for (index, section) in self.sections.iter().enumerate() {
            if section.id.is_empty() {
                return Err(DocumentError::EmptySectionId(index));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(DocumentError::DuplicateSectionId(section.id.clone()));
            }
        }

        if let Some(active) = &self.active_section_id {
            if !seen.contains(active.as_str()) {
                return Err(DocumentError::DanglingActiveSection(active.clone()));
            }
        }

        Ok(())
    }

    /// Equality over user content only
    ///
    /// Ignores the modification timestamp, the version counter and the UI
    /// state, none of which an undo step should be recorded for.
    pub fn content_eq(&self, other: &Document) -> bool {
        self.sections == other.sections
            && self.active_section_id == other.active_section_id
            && self.editor_mode == other.editor_mode
            && self.template == other.template
            && self.customization == other.customization
            && self.metadata.title == other.metadata.title
    }
}
