//! Session composition

use std::sync::Arc;

use folio_autosave::{AutoSaveScheduler, SaveOutcome};
use folio_config::{ConfigError, ConfigManager, FolioConfig, StorageBackend};
use folio_document::{Document, DocumentStore, SaveStatus};
use folio_reorder::{HandleGeometry, ReorderController, StaticGeometry};
use folio_storage::{FileStore, KeyValueStore, MemoryStore, StorageKeys};
use folio_undo_redo::{HistoryConfig, HistoryEngine, HistoryStore};
use tracing::{debug, info, warn};

use crate::error::Result;

/// One open résumé and everything that acts on it
pub struct EditorSession {
    config: FolioConfig,
    keys: StorageKeys,
    storage: Arc<dyn KeyValueStore>,
    store: Arc<DocumentStore>,
    history: Arc<HistoryEngine>,
    autosave: Arc<AutoSaveScheduler>,
    reorder: ReorderController,
}

impl EditorSession {
    /// Open a session on the backend named in `config`
    pub fn open(config: &FolioConfig) -> Result<Self> {
        let storage = build_storage(config)?;
        Self::with_storage(config, storage)
    }

    /// Open a session on an explicit backend
    pub fn with_storage(config: &FolioConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_geometry(config, storage, Arc::new(StaticGeometry::new()))
    }

    /// Open a session whose drag gestures are measured by `geometry`
    pub fn with_geometry(
        config: &FolioConfig,
        storage: Arc<dyn KeyValueStore>,
        geometry: Arc<dyn HandleGeometry>,
    ) -> Result<Self> {
        ConfigManager::default().validate(config)?;
        let keys = StorageKeys::with_prefix(&config.storage.key_prefix);

        let document = load_document(storage.as_ref(), &keys);
        let store = Arc::new(DocumentStore::new(document));

        let history = HistoryEngine::with_storage(
            Arc::clone(&store),
            HistoryConfig {
                max_entries: config.history.max_entries,
                debounce: config.history.debounce(),
                persist: config.history.persist,
            },
            HistoryStore::new(Arc::clone(&storage), keys.history.clone()),
        );
        if config.history.persist {
            match history.load_persisted() {
                Ok(loaded) => debug!(loaded, "restored history"),
                Err(e) => warn!(error = %e, "ignoring unreadable history"),
            }
        }

        let autosave = AutoSaveScheduler::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            keys.clone(),
            config.autosave.interval(),
        );
        if config.autosave.enabled {
            autosave.start();
        }

        let reorder = ReorderController::new(Arc::clone(&store), Arc::clone(&history), geometry);

        info!(
            prefix = %config.storage.key_prefix,
            sections = store.section_count(),
            "editing session opened"
        );
        Ok(Self {
            config: config.clone(),
            keys,
            storage,
            store,
            history,
            autosave,
            reorder,
        })
    }

    /// Settings the session was opened with
    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    /// Storage keys in use
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Backend in use
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// The document store
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// The history engine
    pub fn history(&self) -> &Arc<HistoryEngine> {
        &self.history
    }

    /// The autosave scheduler
    pub fn autosave(&self) -> &Arc<AutoSaveScheduler> {
        &self.autosave
    }

    /// The drag and keyboard reorder controller
    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    /// Replace the document with one parsed from `json`; one undo reverts it
    pub fn import_json(&self, json: &str) -> Result<()> {
        let document: Document = serde_json::from_str(json)?;
        document.validate()?;
        self.history.checkpoint();
        self.store.replace(document)?;
        info!(sections = self.store.section_count(), "document imported");
        Ok(())
    }

    /// Serialize the live document
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.store.state())?)
    }

    /// Start over with an empty document; one undo reverts it
    pub fn reset(&self) -> Result<()> {
        self.history.checkpoint();
        self.store.replace(Document::default())?;
        info!("document reset");
        Ok(())
    }

    /// Flush pending history and unsaved changes, then stop the timer
    pub fn close(self) -> SaveOutcome {
        self.history.flush_pending();
        let outcome = self.autosave.flush_now();
        self.autosave.stop();
        info!(?outcome, "editing session closed");
        outcome
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("keys", &self.keys)
            .field("history", &self.history)
            .field("autosave", &self.autosave)
            .finish()
    }
}

fn build_storage(config: &FolioConfig) -> Result<Arc<dyn KeyValueStore>> {
    let quota = config.storage.quota_bytes;
    let storage: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => match quota {
            Some(quota) => Arc::new(MemoryStore::with_quota(quota)),
            None => Arc::new(MemoryStore::new()),
        },
        StorageBackend::File => {
            let path = config.storage.path.clone().ok_or_else(|| {
                ConfigError::validation("storage.path is required for the file backend")
            })?;
            let store = FileStore::new(path);
            Arc::new(match quota {
                Some(quota) => store.with_quota(quota),
                None => store,
            })
        }
    };
    Ok(storage)
}

/// Persisted document, or a fresh one when it is missing or unusable
fn load_document(storage: &dyn KeyValueStore, keys: &StorageKeys) -> Document {
    let json = match storage.get(&keys.document) {
        Ok(Some(json)) => json,
        Ok(None) => return Document::default(),
        Err(e) => {
            warn!(error = %e, "could not read saved document, starting fresh");
            return Document::default();
        }
    };

    let mut document = match serde_json::from_str::<Document>(&json) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "saved document is not valid JSON, starting fresh");
            return Document::default();
        }
    };
    if let Err(e) = document.validate() {
        warn!(error = %e, "saved document is inconsistent, starting fresh");
        return Document::default();
    }

    document.ui_state.is_dragging = false;
    document.ui_state.dragged_section_id = None;
    document.ui_state.save_status = SaveStatus::Saved;
    document
}
