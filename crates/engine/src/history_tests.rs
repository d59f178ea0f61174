// SPDX-License-Identifier: MIT

use super::*;
use machina_core::StateId;

fn item(kind: HistoryItemKind, path: &str, outcome: Option<i64>) -> HistoryItem {
    HistoryItem {
        kind,
        path: machina_core::StatePath::root(StateId::new(path)),
        state_name: path.into(),
        run_id: Some(machina_core::RunId::generate()),
        outcome,
        at_ms: 1_000,
    }
}

#[test]
fn records_in_order() {
    let history = ExecutionHistory::new();
    assert!(history.is_empty());

    history.record(item(HistoryItemKind::Call, "A", None));
    history.record(item(HistoryItemKind::Return, "A", Some(0)));

    let items = history.snapshot();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].kind, HistoryItemKind::Call);
    assert_eq!(items[1].outcome, Some(0));
    assert_eq!(history.last().unwrap().kind, HistoryItemKind::Return);
}

#[test]
fn clear_resets() {
    let history = ExecutionHistory::new();
    history.record(item(HistoryItemKind::Call, "A", None));
    history.clear();
    assert_eq!(history.len(), 0);
}
