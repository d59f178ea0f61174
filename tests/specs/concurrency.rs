// SPDX-License-Identifier: MIT

//! Barrier and preemptive concurrency.

use crate::prelude::*;
use machina_core::ExecutionStatus;

fn preemptive_race() -> StateRef {
    let root = StateRef::new(State::preemptive("race").with_id("RACE"));
    let fast_id = {
        let mut root_guard = root.write();
        root_guard.add_outcome("fast").unwrap()
    };
    let slow_id = root.write().add_outcome("slow").unwrap();

    root.add_child(wait_leaf("FAST", Duration::from_millis(50))).unwrap();
    root.add_child(wait_leaf("SLOW", Duration::from_millis(1000))).unwrap();
    root.add_transition(Some(StateId::new("FAST")), Some(0), None, Some(fast_id)).unwrap();
    root.add_transition(Some(StateId::new("SLOW")), Some(0), None, Some(slow_id)).unwrap();
    root
}

#[test]
fn preemptive_first_finisher_wins() {
    let machine = machine(preemptive_race());
    let begun = Instant::now();
    let outcome = run(&machine);
    let elapsed = begun.elapsed();

    // "fast" was added first.
    assert_eq!(outcome, Some(0));
    assert!(elapsed < Duration::from_millis(800), "losers must not be awaited: {elapsed:?}");

    let slow = machine.root().read().child(&StateId::new("SLOW")).unwrap();
    assert_eq!(slow.read().run.final_outcome, Some(OUTCOME_PREEMPTED));
    assert_eq!(slow.read().run.status, ExecutionStatus::Inactive);
}

#[test]
fn preemptive_with_one_child_acts_like_a_hierarchy() {
    let root = StateRef::new(State::preemptive("solo").with_id("SOLO"));
    let done = root.write().add_outcome("done").unwrap();
    root.add_child(quick_leaf("ONLY")).unwrap();
    root.add_transition(Some(StateId::new("ONLY")), Some(0), None, Some(done)).unwrap();

    assert_eq!(run(&machine(root)), Some(done));
}

#[test]
fn barrier_waits_for_everyone_then_decides() {
    let root = StateRef::new(State::barrier("sync").with_id("SYNC"));
    let ok = root.write().add_outcome("all_good").unwrap();
    let bad = root.write().add_outcome("degraded").unwrap();

    // One child succeeds with 0, the other with its own outcome 1.
    root.add_child(quick_leaf("LEFT")).unwrap();
    let mut right = State::execution("right").with_id("RIGHT");
    right.add_outcome("done").unwrap();
    right.add_outcome("alt").unwrap();
    let right = right.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult {
        Ok(LeafReturn::Id(1))
    });
    root.add_child(right).unwrap();

    // The decider sees its siblings' outcomes as an injected input and
    // returns 0 iff nobody aborted.
    let mut decider = State::execution("decide").with_id("DECIDE");
    decider.add_outcome("good").unwrap();
    decider.add_outcome("bad").unwrap();
    let decider = decider.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        let outcomes = ctx.input("child_outcomes").cloned().unwrap_or(Value::Null);
        let all_succeeded = outcomes
            .as_object()
            .is_some_and(|map| map.values().all(|v| v.as_i64().unwrap_or(-1) >= 0));
        Ok(LeafReturn::Id(if all_succeeded { 0 } else { 1 }))
    });
    root.add_child(decider).unwrap();
    root.set_decider(Some(StateId::new("DECIDE"))).unwrap();
    root.add_transition(Some(StateId::new("DECIDE")), Some(0), None, Some(ok)).unwrap();
    root.add_transition(Some(StateId::new("DECIDE")), Some(1), None, Some(bad)).unwrap();

    assert_eq!(run(&machine(root)), Some(ok));
}

#[test]
fn barrier_decider_classifies_failures() {
    let root = StateRef::new(State::barrier("sync").with_id("SYNC"));
    let ok = root.write().add_outcome("all_good").unwrap();
    let bad = root.write().add_outcome("degraded").unwrap();

    let mut failing = State::execution("boom").with_id("LEFT");
    failing.add_outcome("done").unwrap();
    let failing = failing.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult {
        Err("broken".into())
    });
    root.add_child(failing).unwrap();
    root.add_child(quick_leaf("RIGHT")).unwrap();

    let mut decider = State::execution("decide").with_id("DECIDE");
    decider.add_outcome("good").unwrap();
    decider.add_outcome("bad").unwrap();
    let decider = decider.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        let errors = ctx.input("child_errors").cloned().unwrap_or(json!({}));
        let clean = errors.as_object().is_some_and(|m| m.is_empty());
        Ok(LeafReturn::Id(if clean { 0 } else { 1 }))
    });
    root.add_child(decider).unwrap();
    root.set_decider(Some(StateId::new("DECIDE"))).unwrap();
    root.add_transition(Some(StateId::new("DECIDE")), Some(0), None, Some(ok)).unwrap();
    root.add_transition(Some(StateId::new("DECIDE")), Some(1), None, Some(bad)).unwrap();

    assert_eq!(run(&machine(root)), Some(bad));
}

#[test]
fn stop_preempts_both_branches_of_a_race() {
    let root = StateRef::new(State::preemptive("race").with_id("RACE"));
    root.write().add_outcome("done").unwrap();
    root.add_child(wait_leaf("A", Duration::from_secs(30))).unwrap();
    root.add_child(wait_leaf("B", Duration::from_secs(30))).unwrap();
    let machine = machine(root);

    let engine = ExecutionEngine::new();
    engine.start(Arc::clone(&machine), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    engine.stop().unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));
    assert_eq!(engine.outcome(), Some(OUTCOME_PREEMPTED));
    for state in all_states(machine.root()) {
        assert_eq!(state.read().run.status, ExecutionStatus::Inactive);
    }
}

#[test]
fn start_path_into_a_preemptive_region_runs_only_the_target() {
    let machine = machine(preemptive_race());
    let engine = ExecutionEngine::new();
    let path = StatePath::parse("RACE/SLOW").unwrap();
    engine.start(Arc::clone(&machine), Some(path)).unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)));

    // Only SLOW ran, so its outcome decides.
    assert_eq!(engine.outcome(), Some(1));
    let fast = machine.root().read().child(&StateId::new("FAST")).unwrap();
    assert!(fast.read().run.run_id.is_none(), "FAST must not have been launched");
}
