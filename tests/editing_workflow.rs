//! End-to-end editing workflows across the session, history, reorder and
//! autosave crates

use std::sync::{Arc, Mutex};

use folio_autosave::SaveOutcome;
use folio_config::FolioConfig;
use folio_document::{DocumentEvent, EventKind, SaveStatus, SaveTarget, Section, SectionPatch};
use folio_integration_tests::{row_y, sample_resume, stacked_geometry};
use folio_reorder::{DropOutcome, MoveDirection, PointerPosition};
use folio_session::EditorSession;
use folio_storage::{KeyValueStore, MemoryStore};

fn config() -> FolioConfig {
    let mut config = FolioConfig::default();
    config.history.debounce_ms = 0;
    config.autosave.enabled = false;
    config
}

fn seeded_backend() -> Arc<dyn KeyValueStore> {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    backend
        .set(
            "folio.document",
            &serde_json::to_string(&sample_resume()).unwrap(),
        )
        .unwrap();
    backend
}

fn order(session: &EditorSession) -> Vec<String> {
    session
        .store()
        .state()
        .sections
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[test]
fn test_drag_then_undo_then_redo() {
    let backend = seeded_backend();
    let geometry = Arc::new(stacked_geometry(&sample_resume()));
    let session = EditorSession::with_geometry(&config(), backend, geometry).unwrap();
    let reorder = session.reorder();

    reorder.begin_drag("skills").unwrap();
    reorder.update_drag_target(PointerPosition::new(10.0, row_y(1, true)), "experience");
    let outcome = reorder
        .drop(PointerPosition::new(10.0, row_y(1, true)), "experience")
        .unwrap();

    assert_eq!(outcome, DropOutcome::Moved { from: 3, to: 1 });
    assert_eq!(
        order(&session),
        ["summary", "skills", "experience", "education"]
    );
    assert!(!session.store().state().ui_state.is_dragging);

    assert!(session.history().undo().unwrap());
    assert_eq!(
        order(&session),
        ["summary", "experience", "education", "skills"]
    );

    assert!(session.history().redo().unwrap());
    assert_eq!(
        order(&session),
        ["summary", "skills", "experience", "education"]
    );
}

#[test]
fn test_typing_between_moves_undoes_in_order() {
    let session = EditorSession::with_storage(&config(), seeded_backend()).unwrap();
    let store = session.store();

    store
        .update_section("summary", SectionPatch::field("text", "Staff engineer"))
        .unwrap();
    session
        .reorder()
        .move_section("summary", MoveDirection::Down)
        .unwrap();
    store.add_section(Section::new("projects"));

    session.history().undo().unwrap();
    assert_eq!(store.section_count(), 4);

    session.history().undo().unwrap();
    assert_eq!(order(&session)[0], "summary");

    session.history().undo().unwrap();
    let summary = store.state().section("summary").cloned().unwrap();
    assert_eq!(summary.content["text"], "Backend engineer");
    assert!(!session.history().can_undo());
}

#[test]
fn test_autosave_does_not_touch_history() {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let session = EditorSession::with_storage(&config(), Arc::clone(&backend)).unwrap();

    session.store().set_title("Draft");
    let entries = session.history().undo_len();

    assert!(matches!(
        session.autosave().flush_now(),
        SaveOutcome::Saved { .. }
    ));
    assert_eq!(session.history().undo_len(), entries);
    assert_eq!(
        session.store().state().ui_state.save_status,
        SaveStatus::Saved
    );

    // Undo is a change the next save must pick up
    session.history().undo().unwrap();
    assert!(session.autosave().has_pending_changes());
    assert_eq!(
        session.store().state().ui_state.save_status,
        SaveStatus::Unsaved
    );
}

#[test]
fn test_history_quota_failure_is_reported_not_raised() {
    let mut config = config();
    config.storage.quota_bytes = Some(32);
    let session = EditorSession::open(&config).unwrap();

    let failures = Arc::new(Mutex::new(Vec::<DocumentEvent>::new()));
    let sink = Arc::clone(&failures);
    session.store().subscribe(EventKind::SaveFailed, move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });

    session.store().set_title("Does not fit");
    assert!(session.history().can_undo());
    assert!(failures.lock().unwrap().iter().any(|event| matches!(
        event,
        DocumentEvent::SaveFailed {
            target: SaveTarget::History,
            ..
        }
    )));

    assert!(session.history().undo().unwrap());
}

#[test]
fn test_reopen_restores_document_and_history() {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let session = EditorSession::with_storage(&config(), Arc::clone(&backend)).unwrap();
    session.import_json(&serde_json::to_string(&sample_resume()).unwrap()).unwrap();
    session.store().set_title("Jane Q. Doe");
    session.close();

    let reopened = EditorSession::with_storage(&config(), backend).unwrap();
    assert_eq!(reopened.store().state().metadata.title, "Jane Q. Doe");
    assert_eq!(reopened.store().section_count(), 4);

    reopened.history().undo().unwrap();
    assert_eq!(reopened.store().state().metadata.title, "Jane Doe");
    reopened.history().undo().unwrap();
    assert_eq!(reopened.store().section_count(), 0);
}
