//! The document store

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::DocumentError;
use crate::events::{DocumentEvent, EventBus, EventKind, SubscriptionId};
use crate::model::{Document, EditorMode, SaveStatus, Section, SectionPatch, UiStatePatch};

/// Sole owner of the live [`Document`]
///
/// Mutations update the document under a write lock, release it, then publish
/// events. Handlers therefore always observe the already-mutated document and
/// may call back into the store.
#[derive(Debug)]
pub struct DocumentStore {
    document: RwLock<Document>,
    bus: EventBus,
}

impl DocumentStore {
    /// Create a store around `document`
    pub fn new(document: Document) -> Self {
        Self {
            document: RwLock::new(document),
            bus: EventBus::new(),
        }
    }

    /// Owned copy of the live document
    pub fn state(&self) -> Document {
        self.document.read().clone()
    }

    /// Borrow the live document without copying it
    ///
    /// `f` must not call back into the store's mutation API.
    pub fn with_state<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.document.read())
    }

    /// Number of sections
    pub fn section_count(&self) -> usize {
        self.document.read().sections.len()
    }

    /// Current document version
    pub fn version(&self) -> u64 {
        self.document.read().metadata.version
    }

    /// Underlying event bus
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Receive events of one kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&DocumentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Receive every event
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DocumentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe_all(handler)
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Publish an event that did not originate from a mutation (e.g. save results)
    pub fn publish(&self, event: DocumentEvent) {
        self.bus.publish(&event);
    }

    fn emit(&self, events: Vec<DocumentEvent>) {
        for event in &events {
            self.bus.publish(event);
        }
    }

    /// Record a content change; returns the new version
    fn touch(doc: &mut Document) -> u64 {
        doc.metadata.version += 1;
        doc.metadata.last_modified = Utc::now();
        doc.ui_state.save_status = SaveStatus::Unsaved;
        doc.metadata.version
    }

    /// Append a section, assigning a fresh id when it has none or its id is taken
    pub fn add_section(&self, mut section: Section) -> String {
        let (id, index, version) = {
            let mut doc = self.document.write();
            if section.id.is_empty() || doc.index_of(&section.id).is_some() {
                section.id = Section::generate_id();
            }
            let id = section.id.clone();
            doc.sections.push(section);
            let index = doc.sections.len() - 1;
            (id, index, Self::touch(&mut doc))
        };

        debug!(section_id = %id, index, "section added");
        self.emit(vec![
            DocumentEvent::SectionAdded {
                section_id: id.clone(),
                index,
            },
            DocumentEvent::Modified { version },
        ]);
        id
    }

    /// Insert a copy of section `id` directly after it; returns the copy's id
    pub fn duplicate_section(&self, id: &str) -> Result<String, DocumentError> {
        let (new_id, index, version) = {
            let mut doc = self.document.write();
            let source = doc
                .index_of(id)
                .ok_or_else(|| DocumentError::section_not_found(id))?;
            let mut copy = doc.sections[source].clone();
            copy.id = Section::generate_id();
            let new_id = copy.id.clone();
            doc.sections.insert(source + 1, copy);
            (new_id, source + 1, Self::touch(&mut doc))
        };

        self.emit(vec![
            DocumentEvent::SectionAdded {
                section_id: new_id.clone(),
                index,
            },
            DocumentEvent::Modified { version },
        ]);
        Ok(new_id)
    }

    /// Remove section `id`, clearing the active pointer if it referenced it
    pub fn remove_section(&self, id: &str) -> Result<Section, DocumentError> {
        let (removed, index, cleared_active, version) = {
            let mut doc = self.document.write();
            let index = doc
                .index_of(id)
                .ok_or_else(|| DocumentError::section_not_found(id))?;
            let removed = doc.sections.remove(index);
            let cleared_active = doc.active_section_id.as_deref() == Some(id);
            if cleared_active {
                doc.active_section_id = None;
            }
            (removed, index, cleared_active, Self::touch(&mut doc))
        };

        debug!(section_id = %id, index, "section removed");
        let mut events = vec![DocumentEvent::SectionRemoved {
            section_id: removed.id.clone(),
            index,
        }];
        if cleared_active {
            events.push(DocumentEvent::ActiveSectionChanged { section_id: None });
        }
        events.push(DocumentEvent::Modified { version });
        self.emit(events);
        Ok(removed)
    }

    /// Merge `patch` into section `id`
    pub fn update_section(&self, id: &str, patch: SectionPatch) -> Result<(), DocumentError> {
        let version = {
            let mut doc = self.document.write();
            let index = doc
                .index_of(id)
                .ok_or_else(|| DocumentError::section_not_found(id))?;
            let section = &mut doc.sections[index];
            if let Some(kind) = patch.kind {
                section.kind = kind;
            }
            if let Some(content) = patch.content {
                section.content.extend(content);
            }
            Self::touch(&mut doc)
        };

        self.emit(vec![
            DocumentEvent::SectionUpdated {
                section_id: id.to_string(),
            },
            DocumentEvent::Modified { version },
        ]);
        Ok(())
    }

    /// Move the section at `from` to `to`
    ///
    /// Callers are expected to pass valid indices; an out-of-range index is a
    /// caller bug and is reported as [`DocumentError::IndexOutOfRange`] without
    /// touching the document. `from == to` is accepted and changes nothing.
    pub fn reorder(&self, from: usize, to: usize) -> Result<(), DocumentError> {
        let version = {
            let mut doc = self.document.write();
            let len = doc.sections.len();
            for index in [from, to] {
                if index >= len {
                    error!(from, to, len, "reorder called with out-of-range index");
                    return Err(DocumentError::IndexOutOfRange { index, len });
                }
            }
            if from == to {
                return Ok(());
            }
            let section = doc.sections.remove(from);
            doc.sections.insert(to, section);
            Self::touch(&mut doc)
        };

        debug!(from, to, "sections reordered");
        self.emit(vec![
            DocumentEvent::SectionsReordered { from, to },
            DocumentEvent::Modified { version },
        ]);
        Ok(())
    }

    /// Point the editor at section `id`, or at nothing
    pub fn set_active_section(&self, id: Option<&str>) -> Result<(), DocumentError> {
        let version = {
            let mut doc = self.document.write();
            if let Some(id) = id {
                if doc.index_of(id).is_none() {
                    return Err(DocumentError::section_not_found(id));
                }
            }
            doc.active_section_id = id.map(str::to_string);
            Self::touch(&mut doc)
        };

        self.emit(vec![
            DocumentEvent::ActiveSectionChanged {
                section_id: id.map(str::to_string),
            },
            DocumentEvent::Modified { version },
        ]);
        Ok(())
    }

    /// Merge presentation flags; does not count as a content change
    pub fn set_ui_state(&self, patch: UiStatePatch) {
        patch.apply(&mut self.document.write().ui_state);
        self.bus.publish(&DocumentEvent::UiStateChanged);
    }

    /// Change the editor mode
    pub fn set_editor_mode(&self, mode: EditorMode) {
        let version = {
            let mut doc = self.document.write();
            doc.editor_mode = mode;
            Self::touch(&mut doc)
        };
        self.emit(vec![
            DocumentEvent::EditorModeChanged { mode },
            DocumentEvent::Modified { version },
        ]);
    }

    /// Change the template
    pub fn set_template(&self, template: impl Into<String>) {
        let template = template.into();
        let version = {
            let mut doc = self.document.write();
            doc.template = template.clone();
            Self::touch(&mut doc)
        };
        self.emit(vec![
            DocumentEvent::TemplateChanged { template },
            DocumentEvent::Modified { version },
        ]);
    }

    /// Shallow-merge style parameters
    pub fn update_customization(&self, partial: Map<String, Value>) {
        let version = {
            let mut doc = self.document.write();
            doc.customization.extend(partial);
            Self::touch(&mut doc)
        };
        self.emit(vec![
            DocumentEvent::CustomizationChanged,
            DocumentEvent::Modified { version },
        ]);
    }

    /// Change the résumé title
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        let version = {
            let mut doc = self.document.write();
            doc.metadata.title = title.clone();
            Self::touch(&mut doc)
        };
        self.emit(vec![
            DocumentEvent::TitleChanged { title },
            DocumentEvent::Modified { version },
        ]);
    }

    /// Swap in a whole new document (reset or import)
    ///
    /// Counts as a user edit: it is announced with `Replaced` then `Modified`.
    pub fn replace(&self, mut document: Document) -> Result<(), DocumentError> {
        document.validate()?;
        let version = {
            let mut doc = self.document.write();
            document.metadata.version = doc.metadata.version;
            document.ui_state = doc.ui_state.clone();
            *doc = document;
            Self::touch(&mut doc)
        };
        self.emit(vec![
            DocumentEvent::Replaced,
            DocumentEvent::Modified { version },
        ]);
        Ok(())
    }

    /// Re-apply a history snapshot
    ///
    /// Content and metadata are overwritten from `snapshot`. The live UI flags
    /// are kept, except `save_status` which becomes `Unsaved`. Only `Restored`
    /// is published. A snapshot that fails validation is rejected and the
    /// live document is left untouched.
    pub fn restore(&self, snapshot: &Document) -> Result<(), DocumentError> {
        snapshot.validate()?;
        let version = {
            let mut doc = self.document.write();
            let mut ui_state = doc.ui_state.clone();
            ui_state.save_status = SaveStatus::Unsaved;
            *doc = snapshot.clone();
            doc.ui_state = ui_state;
            doc.metadata.version
        };

        debug!(version, "document restored");
        self.bus.publish(&DocumentEvent::Restored { version });
        Ok(())
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Document::default())
    }
}
