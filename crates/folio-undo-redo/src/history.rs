//! History management and navigation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_document::{
    Document, DocumentEvent, DocumentStore, EventKind, SaveTarget, SubscriptionId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::UndoRedoError;
use crate::persistence::{HistoryStore, PersistReport};
use crate::snapshot::Snapshot;

/// Default number of undo entries kept
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default quiet period before a burst of edits becomes one entry
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// History engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Undo stack capacity; the oldest entry is evicted beyond it
    pub max_entries: usize,
    /// Quiet period before a burst of edits is captured; zero captures immediately
    pub debounce: Duration,
    /// Write the stacks to storage after every change
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            debounce: DEFAULT_DEBOUNCE,
            persist: true,
        }
    }
}

/// One position on the history timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position; pass to [`HistoryEngine::jump_to`]
    pub index: usize,
    /// When the state was captured
    pub timestamp: DateTime<Utc>,
    /// Document title at that point
    pub title: String,
    /// Number of sections at that point
    pub section_count: usize,
    /// Whether this is the live document
    pub is_current: bool,
}

impl HistoryEntry {
    fn describe(index: usize, document: &Document, timestamp: DateTime<Utc>) -> Self {
        HistoryEntry {
            index,
            timestamp,
            title: document.metadata.title.clone(),
            section_count: document.sections.len(),
            is_current: false,
        }
    }
}

#[derive(Debug)]
struct HistoryState {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    /// Last settled document; what an undo of the next burst returns to
    baseline: Document,
}

impl HistoryState {
    /// Push onto undo unless it repeats the top; evicts past `cap`
    fn push(&mut self, snapshot: Snapshot, cap: usize) -> bool {
        if let Some(top) = self.undo_stack.back() {
            if snapshot.content_eq(top.document()) {
                return false;
            }
        }
        self.push_unchecked(snapshot, cap);
        true
    }

    fn push_unchecked(&mut self, snapshot: Snapshot, cap: usize) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > cap {
            self.undo_stack.pop_front();
        }
    }

    /// Whether capturing now would push the baseline
    fn baseline_is_new(&self) -> bool {
        self.undo_stack
            .back()
            .map_or(true, |top| !top.content_eq(&self.baseline))
    }
}

/// Clears the restoring flag when dropped
struct RestoreGuard<'a>(&'a AtomicBool);

impl<'a> RestoreGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        RestoreGuard(flag)
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

/// Snapshot-based undo/redo for one [`DocumentStore`]
///
/// Listens for `Modified` on the store and records the state *before* each
/// burst of edits. Undo and redo swap whole documents back in through
/// [`DocumentStore::restore`], which does not emit `Modified`, and a restoring
/// flag keeps anything a `Restored` handler does from being recorded.
pub struct HistoryEngine {
    store: Arc<DocumentStore>,
    storage: Option<HistoryStore>,
    config: HistoryConfig,
    state: Mutex<HistoryState>,
    restoring: AtomicBool,
    /// Set by an edit, cleared once the edit has been captured
    unsettled: AtomicBool,
    pending: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl HistoryEngine {
    /// Create an engine that keeps history in memory only
    pub fn new(store: Arc<DocumentStore>, config: HistoryConfig) -> Arc<Self> {
        Self::build(store, config, None)
    }

    /// Create an engine that writes its stacks through `storage`
    pub fn with_storage(
        store: Arc<DocumentStore>,
        config: HistoryConfig,
        storage: HistoryStore,
    ) -> Arc<Self> {
        Self::build(store, config, Some(storage))
    }

    fn build(
        store: Arc<DocumentStore>,
        config: HistoryConfig,
        storage: Option<HistoryStore>,
    ) -> Arc<Self> {
        let baseline = store.state();
        let engine = Arc::new(HistoryEngine {
            store,
            storage,
            config,
            state: Mutex::new(HistoryState {
                undo_stack: VecDeque::new(),
                redo_stack: Vec::new(),
                baseline,
            }),
            restoring: AtomicBool::new(false),
            unsettled: AtomicBool::new(false),
            pending: Mutex::new(None),
            subscription: Mutex::new(None),
        });

        let weak: Weak<HistoryEngine> = Arc::downgrade(&engine);
        let id = engine.store.subscribe(EventKind::Modified, move |_event| {
            if let Some(engine) = weak.upgrade() {
                engine.on_modified();
            }
            Ok(())
        });
        *engine.subscription.lock() = Some(id);

        debug!(
            max_entries = engine.config.max_entries,
            debounce_ms = engine.config.debounce.as_millis() as u64,
            persist = engine.storage.is_some() && engine.config.persist,
            "history engine attached"
        );
        engine
    }

    /// Engine settings
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn on_modified(self: &Arc<Self>) {
        if self.is_restoring() {
            trace!("change during restore, not recorded");
            return;
        }
        self.unsettled.store(true, Ordering::SeqCst);
        if self.config.debounce.is_zero() {
            self.capture_pending();
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(self);
                let delay = self.config.debounce;
                let mut pending = self.pending.lock();
                if let Some(task) = pending.take() {
                    task.abort();
                }
                *pending = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(engine) = weak.upgrade() {
                        engine.capture_pending();
                    }
                }));
            }
            Err(_) => {
                self.capture_pending();
            }
        }
    }

    /// Capture any edits still waiting on the debounce timer
    pub fn flush_pending(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
        self.capture_pending();
    }

    /// Record the burst since the last settled state, if anything changed
    fn capture_pending(&self) -> bool {
        self.unsettled.store(false, Ordering::SeqCst);
        let current = self.store.state();
        let pushed = {
            let mut state = self.state.lock();
            if state.baseline.content_eq(&current) {
                return false;
            }
            let previous = std::mem::replace(&mut state.baseline, current);
            let pushed = state.push(Snapshot::capture(previous), self.config.max_entries);
            state.redo_stack.clear();
            debug!(
                pushed,
                undo = state.undo_stack.len(),
                "captured history entry"
            );
            pushed
        };
        self.persist();
        pushed
    }

    /// Push the current document as an undo point
    ///
    /// Called before structural operations so they undo as one step. Returns
    /// `false` when the document already matches the newest entry.
    pub fn checkpoint(&self) -> bool {
        self.flush_pending();
        let current = self.store.state();
        let pushed = {
            let mut state = self.state.lock();
            let pushed = state.push(Snapshot::capture(current.clone()), self.config.max_entries);
            if pushed {
                state.redo_stack.clear();
            }
            state.baseline = current;
            pushed
        };
        if pushed {
            debug!("history checkpoint");
            self.persist();
        }
        pushed
    }

    /// Step back one entry; `Ok(false)` when there is nothing to undo
    pub fn undo(&self) -> Result<bool, UndoRedoError> {
        self.flush_pending();
        self.step(Direction::Undo)
    }

    /// Step forward one entry; `Ok(false)` when there is nothing to redo
    pub fn redo(&self) -> Result<bool, UndoRedoError> {
        self.flush_pending();
        self.step(Direction::Redo)
    }

    fn step(&self, direction: Direction) -> Result<bool, UndoRedoError> {
        let current = self.store.state();
        let cap = self.config.max_entries;

        // Stacks are updated first so `Restored` handlers see the new position
        let target = {
            let mut state = self.state.lock();
            let top = match direction {
                Direction::Undo => state.undo_stack.back(),
                Direction::Redo => state.redo_stack.last(),
            };
            let Some(top) = top else {
                return Ok(false);
            };
            top.validate()?;

            let target = match direction {
                Direction::Undo => {
                    let target = state.undo_stack.pop_back();
                    state.redo_stack.push(Snapshot::capture(current.clone()));
                    target
                }
                Direction::Redo => {
                    let target = state.redo_stack.pop();
                    state.push_unchecked(Snapshot::capture(current.clone()), cap);
                    target
                }
            };
            let Some(target) = target else {
                return Ok(false);
            };
            state.baseline = target.document().clone();
            target
        };

        let restored = {
            let _guard = RestoreGuard::engage(&self.restoring);
            self.store.restore(target.document())
        };

        if let Err(e) = restored {
            // Put the stacks back the way they were
            let mut state = self.state.lock();
            match direction {
                Direction::Undo => {
                    state.redo_stack.pop();
                    state.undo_stack.push_back(target);
                }
                Direction::Redo => {
                    state.undo_stack.pop_back();
                    state.redo_stack.push(target);
                }
            }
            state.baseline = current;
            return Err(e.into());
        }

        let (undo, redo) = {
            let state = self.state.lock();
            (state.undo_stack.len(), state.redo_stack.len())
        };
        match direction {
            Direction::Undo => debug!(undo, redo, "undo applied"),
            Direction::Redo => debug!(undo, redo, "redo applied"),
        }

        self.persist();
        Ok(true)
    }

    /// Move to timeline position `index` with the fewest undo or redo steps
    ///
    /// Returns the number of steps taken.
    pub fn jump_to(&self, index: usize) -> Result<usize, UndoRedoError> {
        self.flush_pending();
        let (position, max) = {
            let state = self.state.lock();
            let position = state.undo_stack.len();
            (position, position + state.redo_stack.len())
        };
        if index > max {
            return Err(UndoRedoError::IndexOutOfRange { index, max });
        }

        let mut steps = 0;
        if index < position {
            for _ in index..position {
                if !self.step(Direction::Undo)? {
                    break;
                }
                steps += 1;
            }
        } else {
            for _ in position..index {
                if !self.step(Direction::Redo)? {
                    break;
                }
                steps += 1;
            }
        }

        info!(from = position, to = index, steps, "jumped through history");
        Ok(steps)
    }

    /// Check if undo is available, counting edits still waiting on the debounce
    pub fn can_undo(&self) -> bool {
        self.depths().0 > 0
    }

    /// Check if redo is available; a pending edit has already invalidated it
    pub fn can_redo(&self) -> bool {
        self.depths().1 > 0
    }

    /// Number of undo entries, counting a pending capture
    pub fn undo_len(&self) -> usize {
        self.depths().0
    }

    /// Number of redo entries, counting a pending capture
    pub fn redo_len(&self) -> usize {
        self.depths().1
    }

    /// Timeline index of the live document
    pub fn position(&self) -> usize {
        self.undo_len()
    }

    /// Stack depths as they will be once any pending capture lands
    fn depths(&self) -> (usize, usize) {
        let current = self
            .unsettled
            .load(Ordering::SeqCst)
            .then(|| self.store.state());
        let state = self.state.lock();
        let undo = state.undo_stack.len();
        match current {
            Some(current) if !state.baseline.content_eq(&current) => {
                if state.baseline_is_new() {
                    ((undo + 1).min(self.config.max_entries), 0)
                } else {
                    (undo, 0)
                }
            }
            _ => (undo, state.redo_stack.len()),
        }
    }

    /// Whether a snapshot is being re-applied right now
    pub fn is_restoring(&self) -> bool {
        self.restoring.load(Ordering::SeqCst)
    }

    /// Every position: undo entries oldest first, the present, then redo
    /// entries nearest first
    ///
    /// Edits still waiting on the debounce are shown as if already captured.
    pub fn timeline(&self) -> Vec<HistoryEntry> {
        let current = self.store.state();
        let unsettled = self.unsettled.load(Ordering::SeqCst);
        let state = self.state.lock();
        let unrecorded = unsettled && !state.baseline.content_eq(&current);

        let mut past: Vec<(&Document, DateTime<Utc>)> = state
            .undo_stack
            .iter()
            .map(|snapshot| (snapshot.document(), snapshot.timestamp()))
            .collect();
        if unrecorded && state.baseline_is_new() {
            past.push((&state.baseline, state.baseline.metadata.last_modified));
            if past.len() > self.config.max_entries {
                past.remove(0);
            }
        }

        let mut entries = Vec::with_capacity(past.len() + state.redo_stack.len() + 1);
        for (document, timestamp) in past {
            entries.push(HistoryEntry::describe(entries.len(), document, timestamp));
        }

        let mut present =
            HistoryEntry::describe(entries.len(), &current, current.metadata.last_modified);
        present.is_current = true;
        entries.push(present);

        if !unrecorded {
            for snapshot in state.redo_stack.iter().rev() {
                entries.push(HistoryEntry::describe(
                    entries.len(),
                    snapshot.document(),
                    snapshot.timestamp(),
                ));
            }
        }
        entries
    }

    /// Get paginated history
    pub fn get_history(&self, limit: usize, offset: usize) -> Vec<HistoryEntry> {
        self.timeline().into_iter().skip(offset).take(limit).collect()
    }

    /// Forget all history
    pub fn clear(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
        let current = self.store.state();
        {
            let mut state = self.state.lock();
            state.undo_stack.clear();
            state.redo_stack.clear();
            state.baseline = current;
        }
        self.unsettled.store(false, Ordering::SeqCst);
        info!("history cleared");
        self.forget_persisted();
    }

    /// Remove the stored stacks; failures are published, never returned
    fn forget_persisted(&self) {
        if !self.config.persist {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };

        match storage.clear() {
            Ok(()) => debug!(key = storage.key(), "persisted history removed"),
            Err(e) => {
                warn!(error = %e, "failed to remove persisted history");
                self.store.publish(DocumentEvent::SaveFailed {
                    target: SaveTarget::History,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Replace the in-memory stacks with what storage holds
    ///
    /// Snapshots that fail validation are dropped and both stacks are cut to
    /// the configured capacity. Returns the number of entries loaded.
    pub fn load_persisted(&self) -> Result<usize, UndoRedoError> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };
        let Some(saved) = storage.load()? else {
            return Ok(0);
        };

        let total = saved.undo_stack.len() + saved.redo_stack.len();
        let mut undo_stack: VecDeque<Snapshot> = saved
            .undo_stack
            .into_iter()
            .filter(|s| s.validate().is_ok())
            .collect();
        let mut redo_stack: Vec<Snapshot> = saved
            .redo_stack
            .into_iter()
            .filter(|s| s.validate().is_ok())
            .collect();

        let dropped = total - undo_stack.len() - redo_stack.len();
        if dropped > 0 {
            warn!(dropped, "discarded invalid history snapshots");
        }

        let cap = self.config.max_entries;
        while undo_stack.len() > cap {
            undo_stack.pop_front();
        }
        if redo_stack.len() > cap {
            redo_stack.drain(..redo_stack.len() - cap);
        }

        let loaded = undo_stack.len() + redo_stack.len();
        let current = self.store.state();
        {
            let mut state = self.state.lock();
            state.undo_stack = undo_stack;
            state.redo_stack = redo_stack;
            state.baseline = current;
        }
        self.unsettled.store(false, Ordering::SeqCst);

        info!(loaded, saved_at = %saved.timestamp, "history loaded");
        Ok(loaded)
    }

    /// Write the stacks; failures are published, never returned
    fn persist(&self) {
        if !self.config.persist {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };

        let result = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            storage.save(&mut state.undo_stack, &mut state.redo_stack)
        };

        match result {
            Ok(PersistReport::Written) => {}
            Ok(PersistReport::Recovered {
                dropped_undo,
                dropped_redo,
            }) => {
                info!(dropped_undo, dropped_redo, "history persisted after truncation");
            }
            Err(e) => {
                warn!(error = %e, "failed to persist history");
                self.store.publish(DocumentEvent::SaveFailed {
                    target: SaveTarget::History,
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl Drop for HistoryEngine {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
        if let Some(id) = self.subscription.get_mut().take() {
            self.store.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for HistoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HistoryEngine")
            .field("config", &self.config)
            .field("undo", &state.undo_stack.len())
            .field("redo", &state.redo_stack.len())
            .field("restoring", &self.is_restoring())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_document::{Section, SectionPatch, UiStatePatch};
    use folio_storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn immediate() -> HistoryConfig {
        HistoryConfig {
            debounce: Duration::ZERO,
            ..HistoryConfig::default()
        }
    }

    fn store_with(ids: &[&str]) -> Arc<DocumentStore> {
        Arc::new(DocumentStore::new(Document::with_sections(
            ids.iter().map(|id| Section::with_id(*id, "summary")).collect(),
        )))
    }

    fn ids(store: &DocumentStore) -> Vec<String> {
        store.state().sections.into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_checkpoint_reorder_undo() {
        let store = store_with(&["s1", "s2"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        assert!(history.checkpoint());
        store.reorder(0, 1).unwrap();
        assert_eq!(ids(&store), vec!["s2", "s1"]);
        assert_eq!(history.undo_len(), 1);

        assert!(history.undo().unwrap());
        assert_eq!(ids(&store), vec!["s1", "s2"]);
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 1);

        assert!(history.redo().unwrap());
        assert_eq!(ids(&store), vec!["s2", "s1"]);
    }

    #[test]
    fn test_undo_on_empty_stack() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(store, immediate());
        assert!(!history.undo().unwrap());
        assert!(!history.redo().unwrap());
    }

    #[test]
    fn test_new_edit_invalidates_redo() {
        let store = store_with(&["a"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        store.set_title("One");
        store.set_title("Two");
        history.undo().unwrap();
        assert!(history.can_redo());

        store.set_title("Three");
        assert!(!history.can_redo());
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_stack_is_bounded() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        for i in 0..=50 {
            store.set_title(format!("t{i}"));
        }

        assert_eq!(history.undo_len(), 50);
        let timeline = history.timeline();
        assert_eq!(timeline[0].title, "t0");
        assert_eq!(timeline[49].title, "t49");
        assert!(timeline[50].is_current);
    }

    #[test]
    fn test_noop_changes_are_not_recorded() {
        let store = store_with(&["a"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        assert!(history.checkpoint());
        assert!(!history.checkpoint());

        store.set_ui_state(UiStatePatch {
            sidebar_open: Some(false),
            ..UiStatePatch::default()
        });
        store.set_title("Untitled");
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_snapshots_are_isolated_from_later_edits() {
        let store = store_with(&["a"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        store
            .update_section("a", SectionPatch::field("text", "first"))
            .unwrap();
        store
            .update_section("a", SectionPatch::field("text", "second"))
            .unwrap();

        history.undo().unwrap();
        assert_eq!(
            store.state().sections[0].content.get("text"),
            Some(&json!("first"))
        );
        history.undo().unwrap();
        assert!(store.state().sections[0].content.is_empty());
    }

    #[test]
    fn test_restore_is_not_recorded() {
        let store = store_with(&["a"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        // A renderer that writes back on restore must not grow the history
        let writer = Arc::clone(&store);
        store.subscribe(EventKind::Restored, move |_| {
            writer.set_template("modern");
            Ok(())
        });

        store.set_title("Edited");
        history.undo().unwrap();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 1);
        assert!(!history.is_restoring());
    }

    #[test]
    fn test_malformed_snapshot_leaves_document_untouched() {
        let store = store_with(&["a", "b"]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());

        let bad = Document::with_sections(vec![
            Section::with_id("x", "summary"),
            Section::with_id("x", "skills"),
        ]);
        history
            .state
            .lock()
            .undo_stack
            .push_back(Snapshot::capture(bad));

        let before = store.state();
        assert!(matches!(
            history.undo(),
            Err(UndoRedoError::ValidationError(_))
        ));
        assert_eq!(store.state(), before);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_jump_to() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());
        for title in ["a", "b", "c", "d"] {
            store.set_title(title);
        }
        // Untitled, a, b, c | d
        assert_eq!(history.position(), 4);

        assert_eq!(history.jump_to(1).unwrap(), 3);
        assert_eq!(store.state().metadata.title, "a");
        assert_eq!(history.redo_len(), 3);

        assert_eq!(history.jump_to(3).unwrap(), 2);
        assert_eq!(store.state().metadata.title, "c");

        assert!(matches!(
            history.jump_to(6),
            Err(UndoRedoError::IndexOutOfRange { index: 6, max: 4 })
        ));
    }

    #[test]
    fn test_timeline_orders_redo_nearest_first() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());
        for title in ["a", "b", "c"] {
            store.set_title(title);
        }
        history.undo().unwrap();
        history.undo().unwrap();

        let titles: Vec<String> = history.timeline().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Untitled", "a", "b", "c"]);
        assert!(history.timeline()[1].is_current);

        let page = history.get_history(2, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].index, 1);
    }

    #[test]
    fn test_clear() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), immediate());
        store.set_title("a");
        store.set_title("b");
        history.undo().unwrap();

        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_clear_removes_persisted_history() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = store_with(&[]);
        let history = HistoryEngine::with_storage(
            Arc::clone(&store),
            immediate(),
            HistoryStore::new(Arc::clone(&backend), "folio.history"),
        );
        store.set_title("a");
        assert!(backend.get("folio.history").unwrap().is_some());

        history.clear();
        assert_eq!(backend.get("folio.history").unwrap(), None);
        assert_eq!(history.load_persisted().unwrap(), 0);
    }

    #[test]
    fn test_dropping_engine_unsubscribes() {
        let store = store_with(&[]);
        let before = store.events().subscriber_count();
        let history = HistoryEngine::new(Arc::clone(&store), immediate());
        assert_eq!(store.events().subscriber_count(), before + 1);
        drop(history);
        assert_eq!(store.events().subscriber_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_burst() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), HistoryConfig::default());

        for i in 0..5 {
            store.set_title(format!("draft {i}"));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(history.undo_len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(history.undo_len(), 1);

        history.undo().unwrap();
        assert_eq!(store.state().metadata.title, "Untitled");
        assert!(!history.can_undo());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queries_see_edits_waiting_on_debounce() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), HistoryConfig::default());

        store.set_title("first");
        assert!(history.can_undo());
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.position(), 1);

        history.flush_pending();
        history.undo().unwrap();
        assert!(history.can_redo());

        store.set_title("branch");
        assert!(!history.can_redo());
        assert_eq!(history.redo_len(), 0);
        assert!(history.can_undo());

        let timeline = history.timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].title, "Untitled");
        assert!(timeline[1].is_current);
        assert_eq!(timeline[1].title, "branch");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!history.can_redo());
        assert!(!history.redo().unwrap());
        assert_eq!(history.undo_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_flushes_pending_capture() {
        let store = store_with(&[]);
        let history = HistoryEngine::new(Arc::clone(&store), HistoryConfig::default());

        store.set_title("typed");
        assert!(history.undo().unwrap());
        assert_eq!(store.state().metadata.title, "Untitled");
        assert_eq!(history.redo_len(), 1);
    }

    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        reject_next: AtomicBool,
        attempts: AtomicUsize,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.reject_next.swap(false, Ordering::SeqCst) {
                return Err(StorageError::quota_exceeded(key, value.len(), 0));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            self.inner.keys()
        }
    }

    #[test]
    fn test_quota_recovery_halves_undo_and_clears_redo() {
        let store = store_with(&[]);
        let backend = Arc::new(FlakyStore::default());
        let history = HistoryEngine::with_storage(
            Arc::clone(&store),
            immediate(),
            HistoryStore::new(backend.clone(), "folio.history"),
        );

        for title in ["a", "b", "c", "d", "e", "f"] {
            store.set_title(title);
        }
        history.undo().unwrap();
        assert_eq!(history.undo_len(), 5);
        assert_eq!(history.redo_len(), 1);

        backend.reject_next.store(true, Ordering::SeqCst);
        let attempts = backend.attempts.load(Ordering::SeqCst);
        assert!(history.undo().unwrap());

        // 4 undo entries left after the step, oldest 2 dropped, one retry
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.redo_len(), 0);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), attempts + 2);
        assert_eq!(store.state().metadata.title, "d");

        let saved = HistoryStore::new(backend.clone(), "folio.history")
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(saved.undo_stack.len(), 2);
        assert!(saved.redo_stack.is_empty());
    }

    #[test]
    fn test_persistent_storage_failure_is_published() {
        let store = store_with(&[]);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        store.subscribe(EventKind::SaveFailed, move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });

        let history = HistoryEngine::with_storage(
            Arc::clone(&store),
            immediate(),
            HistoryStore::new(Arc::new(MemoryStore::with_quota(8)), "folio.history"),
        );

        store.set_title("a");
        assert_eq!(history.undo_len(), 1);
        assert!(matches!(
            failures.lock().first(),
            Some(DocumentEvent::SaveFailed {
                target: SaveTarget::History,
                ..
            })
        ));

        // Editing continues in memory
        store.set_title("b");
        assert!(history.undo().unwrap());
    }

    #[test]
    fn test_load_persisted_restores_stacks() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = store_with(&[]);
        let history = HistoryEngine::with_storage(
            Arc::clone(&store),
            immediate(),
            HistoryStore::new(Arc::clone(&backend), "folio.history"),
        );
        store.set_title("a");
        store.set_title("b");
        history.undo().unwrap();

        let reopened_store = Arc::new(DocumentStore::new(store.state()));
        let reopened = HistoryEngine::with_storage(
            Arc::clone(&reopened_store),
            immediate(),
            HistoryStore::new(backend, "folio.history"),
        );
        assert_eq!(reopened.load_persisted().unwrap(), 2);
        assert_eq!(reopened.undo_len(), 1);
        assert_eq!(reopened.redo_len(), 1);

        reopened.redo().unwrap();
        assert_eq!(reopened_store.state().metadata.title, "b");
    }

    #[test]
    fn test_load_persisted_drops_invalid_snapshots() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut undo: VecDeque<Snapshot> = VecDeque::new();
        undo.push_back(Snapshot::capture(Document::default()));
        undo.push_back(Snapshot::capture(Document::with_sections(vec![
            Section::with_id("x", "summary"),
            Section::with_id("x", "summary"),
        ])));
        HistoryStore::new(Arc::clone(&backend), "h")
            .save(&mut undo, &mut Vec::new())
            .unwrap();

        let store = store_with(&["a"]);
        let history =
            HistoryEngine::with_storage(Arc::clone(&store), immediate(), HistoryStore::new(backend, "h"));
        let before = store.state();

        assert_eq!(history.load_persisted().unwrap(), 1);
        assert_eq!(store.state(), before);
    }
}
