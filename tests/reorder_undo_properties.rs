//! Property tests: any sequence of drags can be walked back with undo

use std::sync::Arc;

use folio_config::FolioConfig;
use folio_integration_tests::{row_y, sample_resume, stacked_geometry};
use folio_reorder::{DropOutcome, PointerPosition, StaticGeometry};
use folio_session::EditorSession;
use folio_storage::{KeyValueStore, MemoryStore};
use proptest::prelude::*;

fn session() -> EditorSession {
    let mut config = FolioConfig::default();
    config.history.debounce_ms = 0;
    config.autosave.enabled = false;

    let document = sample_resume();
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    backend
        .set("folio.document", &serde_json::to_string(&document).unwrap())
        .unwrap();
    let geometry: Arc<StaticGeometry> = Arc::new(stacked_geometry(&document));
    EditorSession::with_geometry(&config, backend, geometry).unwrap()
}

fn ids(session: &EditorSession) -> Vec<String> {
    session
        .store()
        .state()
        .section_ids()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Drag the section at `from` onto the row at `target`
///
/// Geometry is keyed by id, so rows are looked up in the original layout.
fn drag(
    session: &EditorSession,
    layout: &[String],
    from: usize,
    target: usize,
    before: bool,
) -> DropOutcome {
    let current = ids(session);
    let reorder = session.reorder();
    reorder.begin_drag(&current[from]).unwrap();

    let target_id = &current[target];
    let row = layout.iter().position(|id| id == target_id).unwrap();
    let pointer = PointerPosition::new(10.0, row_y(row, before));
    reorder.update_drag_target(pointer, target_id);
    reorder.drop(pointer, target_id).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_each_drag_is_one_undo_step(
        drags in prop::collection::vec((0usize..4, 0usize..4, any::<bool>()), 1..8)
    ) {
        let session = session();
        let layout = ids(&session);
        let mut orders = vec![layout.clone()];

        for (from, target, before) in drags {
            if let DropOutcome::Moved { .. } = drag(&session, &layout, from, target, before) {
                orders.push(ids(&session));
            }
            prop_assert!(!session.reorder().is_dragging());
        }

        while orders.len() > 1 {
            orders.pop();
            prop_assert!(session.history().undo().unwrap());
            prop_assert_eq!(&ids(&session), orders.last().unwrap());
        }
        prop_assert!(!session.history().can_undo());
    }

    #[test]
    fn prop_drag_never_loses_sections(
        drags in prop::collection::vec((0usize..4, 0usize..4, any::<bool>()), 1..12)
    ) {
        let session = session();
        let layout = ids(&session);

        for (from, target, before) in drags {
            drag(&session, &layout, from, target, before);
        }

        let mut now = ids(&session);
        now.sort();
        let mut expected = layout.clone();
        expected.sort();
        prop_assert_eq!(now, expected);
    }
}
