// SPDX-License-Identifier: MIT

//! Structural laws: hashes, round trips, reserved elements.

use crate::prelude::*;
use machina_core::{ModelError, OUTCOME_ABORTED as ABORTED, OUTCOME_PREEMPTED as PREEMPTED};
use similar_asserts::assert_eq as assert_same;

#[test]
fn add_then_remove_restores_the_tree_hash() {
    let root = chain(vec![quick_leaf("A")]);
    let original = root.read().tree_hash();

    root.add_child(quick_leaf("S")).unwrap();
    let with_s = root.read().tree_hash();
    assert_ne!(with_s, original);

    root.remove_child(&StateId::new("S")).unwrap();
    assert_eq!(root.read().tree_hash(), original);

    // Redoing the add lands on the same hash again.
    root.add_child(quick_leaf("S")).unwrap();
    assert_eq!(root.read().tree_hash(), with_s);
}

#[test]
fn reserved_outcomes_exist_on_every_state_at_all_times() {
    let machine = machine(chain(vec![quick_leaf("A"), quick_leaf("B")]));
    for state in all_states(machine.root()) {
        let state = state.read();
        assert!(state.outcomes().contains_key(&ABORTED), "{} lacks aborted", state.name());
        assert!(state.outcomes().contains_key(&PREEMPTED), "{} lacks preempted", state.name());
    }
    // And they cannot be removed.
    let a = machine.root().read().child(&StateId::new("A")).unwrap();
    assert!(matches!(a.remove_outcome(ABORTED), Err(ModelError::ReservedElement { .. })));
}

#[test]
fn serialize_deserialize_is_hash_equal() {
    let root = chain(vec![quick_leaf("A"), quick_leaf("B")]);
    root.add_scoped_variable("acc", DataType::Int, Some(json!(0))).unwrap();
    let machine = machine(root);

    let json = machine.to_json().unwrap();
    let reloaded = StateMachine::from_json(&json).unwrap();
    assert_same!(reloaded.to_json().unwrap(), json);
    assert_eq!(reloaded.tree_hash(), machine.tree_hash());
}

#[test]
fn machines_survive_a_file_round_trip() {
    let machine = machine(chain(vec![quick_leaf("A")]));
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("machine.json");
    std::fs::write(&file, machine.to_json().unwrap()).unwrap();

    let raw = std::fs::read_to_string(&file).unwrap();
    let reloaded = StateMachine::from_json(&raw).unwrap();
    assert_eq!(reloaded.tree_hash(), machine.tree_hash());
}

#[test]
fn running_does_not_change_the_tree_hash() {
    let machine = machine(chain(vec![quick_leaf("A")]));
    let before = machine.tree_hash();
    assert_eq!(run(&machine), Some(0));
    assert_eq!(machine.tree_hash(), before);
}

#[test]
fn mismatched_flow_types_never_attach() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    let mut a = State::execution("a").with_id("A");
    a.add_outcome("done").unwrap();
    a.add_output_port("text", DataType::Str, None).unwrap();
    let mut b = State::execution("b").with_id("B");
    b.add_outcome("done").unwrap();
    b.add_input_port("count", DataType::Int, None).unwrap();
    root.add_child(a).unwrap();
    root.add_child(b).unwrap();
    root.set_start_state(Some(StateId::new("A"))).unwrap();

    assert!(matches!(
        root.add_data_flow(StateId::new("A"), 0, StateId::new("B"), 0),
        Err(ModelError::TypeMismatch { .. })
    ));
    assert!(root.read().container().unwrap().data_flows.is_empty());
}

#[test]
fn barrier_without_decider_is_rejected_at_validation() {
    let root = StateRef::new(State::barrier("sync").with_id("SYNC"));
    root.add_child(quick_leaf("A")).unwrap();
    let err = StateMachine::new(root).unwrap_err();
    assert!(matches!(err, ModelError::MissingDecider { .. }));
}

#[test]
fn observers_see_every_structural_operation() {
    let machine = machine(chain(vec![quick_leaf("A")]));
    let (_id, rx) = machine.bus().channel(&[]);

    machine.root().add_child(quick_leaf("X")).unwrap();
    let x = machine.root().read().child(&StateId::new("X")).unwrap();
    x.add_input_port("n", DataType::Int, None).unwrap();
    x.add_outcome("extra").unwrap();
    machine.root().remove_child(&StateId::new("X")).unwrap();

    let seen: Vec<String> = rx.try_iter().map(|e| e.property.to_string()).collect();
    assert_eq!(seen, vec!["add_state", "add_input_port", "add_outcome", "remove_state"]);
}

#[test]
fn execution_emits_status_events_for_observers() {
    let machine = machine(chain(vec![quick_leaf("A")]));
    let (_id, rx) = machine.bus().channel(&[machina_core::ChangeKind::Execution]);
    assert_eq!(run(&machine), Some(0));

    let events: Vec<(String, String)> =
        rx.try_iter().map(|e| (e.subject.to_string(), e.property.to_string())).collect();
    // The leaf goes active and reports a final outcome.
    assert!(events.iter().any(|(s, p)| s == "ROOT/A" && p == "status"));
    assert!(events.iter().any(|(s, p)| s == "ROOT/A" && p == "final_outcome"));
    assert!(events.iter().any(|(s, p)| s == "ROOT" && p == "final_outcome"));
}
