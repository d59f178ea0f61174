// SPDX-License-Identifier: MIT

//! Driver control: pause/resume, stop, stepping.

use crate::prelude::*;
use machina_core::ExecutionStatus;
use serial_test::serial;

#[test]
#[serial]
fn pause_holds_progress_and_resume_completes() {
    // The leaf waits preemptibly; paused time must not count as progress.
    let machine = machine(chain(vec![wait_leaf("A", Duration::from_millis(500))]));
    let engine = ExecutionEngine::new();

    let begun = Instant::now();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.pause().unwrap();

    // No completion while paused.
    assert!(!engine.join(Some(Duration::from_millis(300))));

    engine.resume().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));
    assert_eq!(engine.outcome(), Some(0));
    assert!(begun.elapsed() >= Duration::from_millis(400));
}

#[test]
#[serial]
fn stop_leaves_every_state_inactive() {
    let slow = wait_leaf("SLOW", Duration::from_secs(30));
    let inner = {
        let inner = StateRef::new(State::hierarchy("inner").with_id("INNER"));
        inner.write().add_outcome("done").unwrap();
        inner.add_child(slow).unwrap();
        inner.set_start_state(Some(StateId::new("SLOW"))).unwrap();
        inner.add_transition(Some(StateId::new("SLOW")), Some(0), None, Some(0)).unwrap();
        inner
    };
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    {
        // Re-attach the built inner container under the root.
        let detached = inner.read().deep_clone();
        root.add_child(detached).unwrap();
    }
    root.set_start_state(Some(StateId::new("INNER"))).unwrap();
    root.add_transition(Some(StateId::new("INNER")), Some(0), None, Some(0)).unwrap();
    let machine = machine(root);

    let engine = ExecutionEngine::new();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.stop().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));

    assert_eq!(engine.outcome(), Some(OUTCOME_PREEMPTED));
    for state in all_states(machine.root()) {
        assert_eq!(state.read().run.status, ExecutionStatus::Inactive, "{:?}", state);
    }
}

#[test]
#[serial]
fn preempting_twice_equals_preempting_once() {
    let machine = machine(chain(vec![wait_leaf("A", Duration::from_secs(30))]));
    let engine = ExecutionEngine::new();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    engine.stop().unwrap();
    engine.stop().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));
    assert_eq!(engine.outcome(), Some(OUTCOME_PREEMPTED));

    let a = machine.root().read().child(&StateId::new("A")).unwrap();
    assert_eq!(a.read().run.final_outcome, Some(OUTCOME_PREEMPTED));
}

#[test]
#[serial]
fn backward_step_unwinds_and_forward_rerun_completes() {
    // A sleeps through the pause request (a CPU-bound quantum), so the
    // run parks at the gate before B with A in the history.
    let machine = machine(chain(vec![
        tracking_leaf("A", "a_runs", Duration::from_millis(300)),
        tracking_leaf("B", "b_runs", Duration::ZERO),
    ]));
    let engine = ExecutionEngine::new();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.pause().unwrap();
    // Wait for A's quantum to end and the gate to park.
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(engine.globals().get("a_runs"), Some(json!(1)));
    assert_eq!(engine.globals().get("b_runs"), None);

    engine.backward_step().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(engine.globals().get("a_runs.backward"), Some(json!(true)));
    assert_eq!(engine.mode(), ExecutionMode::Paused);

    engine.resume().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));
    assert_eq!(engine.outcome(), Some(0));
    // A ran forward twice: once before the unwind, once after.
    assert_eq!(engine.globals().get("a_runs"), Some(json!(2)));
    assert_eq!(engine.globals().get("b_runs"), Some(json!(1)));
}

#[test]
#[serial]
fn step_over_runs_one_sibling_then_pauses() {
    let machine = machine(chain(vec![
        tracking_leaf("A", "sa_runs", Duration::from_millis(250)),
        tracking_leaf("B", "sb_runs", Duration::ZERO),
        tracking_leaf("C", "sc_runs", Duration::ZERO),
    ]));
    let engine = ExecutionEngine::new();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.pause().unwrap();
    // A finishes its quantum; the gate before B parks.
    std::thread::sleep(Duration::from_millis(350));

    engine.step_over().unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(engine.globals().get("sb_runs"), Some(json!(1)));
    assert_eq!(engine.globals().get("sc_runs"), None, "step must stop before C");
    assert_eq!(engine.mode(), ExecutionMode::Paused);

    engine.resume().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));
    assert_eq!(engine.outcome(), Some(0));
    assert_eq!(engine.globals().get("sc_runs"), Some(json!(1)));
}

#[test]
fn stopping_an_unstarted_engine_is_idempotent() {
    let engine = ExecutionEngine::new();
    engine.stop().unwrap();
    engine.stop().unwrap();
    assert_eq!(engine.mode(), ExecutionMode::Stopped);
}
