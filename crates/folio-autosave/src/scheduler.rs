//! Periodic save scheduler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_document::{
    Document, DocumentEvent, DocumentStore, EventKind, SaveStatus, SaveTarget, SubscriptionId,
    UiStatePatch,
};
use folio_storage::{KeyValueStore, StorageKeys};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::AutoSaveError;

/// Shortest period the timer accepts
pub const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Period used when none is configured
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// What a single save attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last successful save
    Skipped,
    /// The document was written
    Saved {
        /// Completion time
        at: DateTime<Utc>,
    },
    /// The write failed; the changes stay pending
    Failed {
        /// Human-readable reason
        reason: String,
    },
}

#[derive(Debug)]
struct Timer {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

/// Writes the live document to storage on a fixed period when it has changed
///
/// The dirty flag is raised by `Modified`, `Restored` and `Replaced` and only
/// lowered by a successful write, so a failed save is retried on the next tick.
pub struct AutoSaveScheduler {
    store: Arc<DocumentStore>,
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    pending: AtomicBool,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
    timer: Mutex<Timer>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_AUTOSAVE_INTERVAL {
        warn!(
            requested_ms = interval.as_millis() as u64,
            minimum_ms = MIN_AUTOSAVE_INTERVAL.as_millis() as u64,
            "autosave interval too short, clamping"
        );
        MIN_AUTOSAVE_INTERVAL
    } else {
        interval
    }
}

impl AutoSaveScheduler {
    /// Create a stopped scheduler; call [`start`](Self::start) to run the timer
    pub fn new(
        store: Arc<DocumentStore>,
        storage: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        interval: Duration,
    ) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            store,
            storage,
            keys,
            pending: AtomicBool::new(false),
            last_saved_at: Mutex::new(None),
            timer: Mutex::new(Timer {
                interval: clamp_interval(interval),
                task: None,
            }),
            subscriptions: Mutex::new(Vec::new()),
        });

        let ids = [EventKind::Modified, EventKind::Restored, EventKind::Replaced]
            .into_iter()
            .map(|kind| {
                let weak = Arc::downgrade(&scheduler);
                scheduler.store.subscribe(kind, move |_event| {
                    if let Some(scheduler) = weak.upgrade() {
                        scheduler.pending.store(true, Ordering::SeqCst);
                    }
                    Ok(())
                })
            })
            .collect();
        *scheduler.subscriptions.lock() = ids;

        scheduler
    }

    /// Run one save cycle
    pub fn tick(&self) -> SaveOutcome {
        if !self.pending.swap(false, Ordering::SeqCst) {
            trace!("no pending changes, skipping save");
            return SaveOutcome::Skipped;
        }

        // Read before flagging Saving so the stored copy never carries it
        let document = self.store.state();
        self.store
            .set_ui_state(UiStatePatch::save_status(SaveStatus::Saving));

        match self.write(&document) {
            Ok(at) => {
                *self.last_saved_at.lock() = Some(at);
                // An edit that landed during the write keeps the document unsaved
                let status = if self.pending.load(Ordering::SeqCst) {
                    SaveStatus::Unsaved
                } else {
                    SaveStatus::Saved
                };
                self.store.set_ui_state(UiStatePatch::save_status(status));
                self.store.publish(DocumentEvent::SaveCompleted {
                    target: SaveTarget::Document,
                    at,
                });
                debug!(version = document.metadata.version, %at, "document saved");
                SaveOutcome::Saved { at }
            }
            Err(e) => {
                self.pending.store(true, Ordering::SeqCst);
                let reason = e.to_string();
                warn!(error = %reason, "autosave failed");
                self.store
                    .set_ui_state(UiStatePatch::save_status(SaveStatus::Unsaved));
                self.store.publish(DocumentEvent::SaveFailed {
                    target: SaveTarget::Document,
                    reason: reason.clone(),
                });
                SaveOutcome::Failed { reason }
            }
        }
    }

    fn write(&self, document: &Document) -> Result<DateTime<Utc>, AutoSaveError> {
        let json = serde_json::to_string(document)?;
        self.storage.set(&self.keys.document, &json)?;
        let at = Utc::now();
        self.storage
            .set(&self.keys.last_save, &at.timestamp_millis().to_string())?;
        Ok(at)
    }

    /// Save immediately, e.g. when the host is about to go away
    pub fn flush_now(&self) -> SaveOutcome {
        debug!("autosave flush requested");
        self.tick()
    }

    /// Start the timer
    ///
    /// Returns `false` when there is no tokio runtime to run it on. Starting a
    /// running scheduler does nothing.
    pub fn start(self: &Arc<Self>) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime, autosave timer not started");
            return false;
        };

        let mut timer = self.timer.lock();
        if timer.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return true;
        }
        timer.task = Some(self.spawn_timer(&handle, timer.interval));
        info!(interval_secs = timer.interval.as_secs(), "autosave started");
        true
    }

    fn spawn_timer(self: &Arc<Self>, handle: &Handle, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(scheduler) = weak.upgrade() else {
                    break;
                };
                scheduler.tick();
            }
        })
    }

    /// Stop the timer; pending changes are kept
    pub fn stop(&self) {
        if let Some(task) = self.timer.lock().task.take() {
            task.abort();
            info!("autosave stopped");
        }
    }

    /// Whether the timer is running
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Change the period, restarting a running timer; returns the period in effect
    pub fn set_interval(self: &Arc<Self>, interval: Duration) -> Duration {
        let interval = clamp_interval(interval);
        let mut timer = self.timer.lock();
        timer.interval = interval;

        if let Some(task) = timer.task.take() {
            task.abort();
            if let Ok(handle) = Handle::try_current() {
                timer.task = Some(self.spawn_timer(&handle, interval));
            }
        }
        debug!(interval_secs = interval.as_secs(), "autosave interval changed");
        interval
    }

    /// Current period
    pub fn interval(&self) -> Duration {
        self.timer.lock().interval
    }

    /// Time of the last successful save in this session
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.last_saved_at.lock()
    }

    /// Whether there are changes not yet written
    pub fn has_pending_changes(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().task.take() {
            task.abort();
        }
        for id in self.subscriptions.get_mut().drain(..) {
            self.store.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for AutoSaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaveScheduler")
            .field("keys", &self.keys)
            .field("interval", &self.interval())
            .field("pending", &self.has_pending_changes())
            .field("running", &self.is_running())
            .finish()
    }
}
