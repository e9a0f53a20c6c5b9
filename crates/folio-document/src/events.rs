//! Typed change notifications
//!
//! Delivery is synchronous and ordered by registration. The subscriber list is
//! copied out before dispatch, so a handler may read the store, subscribe or
//! unsubscribe without deadlocking. Each handler runs in isolation: an `Err`
//! return or a panic is logged and delivery continues with the next handler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::model::EditorMode;

/// What a save notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveTarget {
    /// The full document snapshot
    Document,
    /// The undo/redo stacks
    History,
}

/// Notifications published on a document's [`EventBus`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentEvent {
    /// A section was appended or inserted
    SectionAdded {
        /// Id of the new section
        section_id: String,
        /// Where it was inserted
        index: usize,
    },
    /// A section was removed
    SectionRemoved {
        /// Id of the removed section
        section_id: String,
        /// Where it used to be
        index: usize,
    },
    /// A section's type or content changed
    SectionUpdated {
        /// Id of the changed section
        section_id: String,
    },
    /// A section moved
    SectionsReordered {
        /// Previous index
        from: usize,
        /// New index
        to: usize,
    },
    /// The active section pointer changed
    ActiveSectionChanged {
        /// New active section
        section_id: Option<String>,
    },
    /// The editor mode changed
    EditorModeChanged {
        /// New mode
        mode: EditorMode,
    },
    /// The template changed
    TemplateChanged {
        /// New template identifier
        template: String,
    },
    /// Customization keys were merged
    CustomizationChanged,
    /// The title changed
    TitleChanged {
        /// New title
        title: String,
    },
    /// Presentation flags changed
    UiStateChanged,
    /// Generic "content changed"; follows every more specific content event
    Modified {
        /// Document version after the change
        version: u64,
    },
    /// History re-applied a snapshot
    Restored {
        /// Document version after the restore
        version: u64,
    },
    /// The whole document was swapped (reset or import)
    Replaced,
    /// A durable write succeeded
    SaveCompleted {
        /// What was written
        target: SaveTarget,
        /// When it completed
        at: DateTime<Utc>,
    },
    /// A durable write failed; editing continues in memory
    SaveFailed {
        /// What failed to be written
        target: SaveTarget,
        /// Human-readable reason
        reason: String,
    },
}

/// Fieldless discriminant of [`DocumentEvent`], used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EventKind {
    SectionAdded,
    SectionRemoved,
    SectionUpdated,
    SectionsReordered,
    ActiveSectionChanged,
    EditorModeChanged,
    TemplateChanged,
    CustomizationChanged,
    TitleChanged,
    UiStateChanged,
    Modified,
    Restored,
    Replaced,
    SaveCompleted,
    SaveFailed,
}

impl DocumentEvent {
    /// Discriminant of this event
    pub fn kind(&self) -> EventKind {
        match self {
            DocumentEvent::SectionAdded { .. } => EventKind::SectionAdded,
            DocumentEvent::SectionRemoved { .. } => EventKind::SectionRemoved,
            DocumentEvent::SectionUpdated { .. } => EventKind::SectionUpdated,
            DocumentEvent::SectionsReordered { .. } => EventKind::SectionsReordered,
            DocumentEvent::ActiveSectionChanged { .. } => EventKind::ActiveSectionChanged,
            DocumentEvent::EditorModeChanged { .. } => EventKind::EditorModeChanged,
            DocumentEvent::TemplateChanged { .. } => EventKind::TemplateChanged,
            DocumentEvent::CustomizationChanged => EventKind::CustomizationChanged,
            DocumentEvent::TitleChanged { .. } => EventKind::TitleChanged,
            DocumentEvent::UiStateChanged => EventKind::UiStateChanged,
            DocumentEvent::Modified { .. } => EventKind::Modified,
            DocumentEvent::Restored { .. } => EventKind::Restored,
            DocumentEvent::Replaced => EventKind::Replaced,
            DocumentEvent::SaveCompleted { .. } => EventKind::SaveCompleted,
            DocumentEvent::SaveFailed { .. } => EventKind::SaveFailed,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&DocumentEvent) -> anyhow::Result<()> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    handler: Handler,
}

/// Synchronous, registration-ordered publish/subscribe channel
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Receive events of one kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&DocumentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    /// Receive every event
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DocumentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    fn register(&self, filter: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            filter,
            handler,
        });
        id
    }

    /// Remove a subscription; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every matching subscriber, in registration order
    pub fn publish(&self, event: &DocumentEvent) {
        let kind = event.kind();
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.filter.map_or(true, |f| f == kind))
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();

        trace!(?kind, subscribers = handlers.len(), "publishing event");

        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(subscription = ?id, ?kind, error = %err, "event handler failed");
                }
                Err(_) => {
                    error!(subscription = ?id, ?kind, "event handler panicked");
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
