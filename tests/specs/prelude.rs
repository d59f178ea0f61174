// SPDX-License-Identifier: MIT

//! Shared builders for the behavior specs.

pub use machina_core::{
    DataType, LeafContext, LeafResult, LeafReturn, State, StateId, StateMachine, StatePath,
    StateRef, Value, OUTCOME_ABORTED, OUTCOME_PREEMPTED,
};
pub use machina_engine::{ExecutionEngine, ExecutionMode};
pub use serde_json::json;
pub use std::sync::Arc;
pub use std::time::{Duration, Instant};

pub const JOIN_BUDGET: Duration = Duration::from_secs(10);

/// Leaf that immediately succeeds with outcome 0 ("done").
pub fn quick_leaf(id: &str) -> State {
    let mut state = State::execution(id).with_id(id);
    state.add_outcome("done").unwrap();
    state.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult { Ok(LeafReturn::Id(0)) })
}

/// Leaf that waits preemptibly, then succeeds with outcome 0.
pub fn wait_leaf(id: &str, wait: Duration) -> State {
    let mut state = State::execution(id).with_id(id);
    state.add_outcome("done").unwrap();
    state.with_body(move |ctx: &mut LeafContext<'_>| -> LeafResult {
        ctx.preemptive_wait(wait);
        Ok(LeafReturn::Id(0))
    })
}

/// Leaf that sleeps uninterruptibly (models a CPU-bound quantum), bumps
/// the global counter named after itself, then succeeds. The backward
/// hook records itself under `<counter>.backward`.
pub struct TrackingLeaf {
    pub counter: &'static str,
    pub sleep: Duration,
}

impl machina_core::Leaf for TrackingLeaf {
    fn execute(&self, ctx: &mut LeafContext<'_>) -> LeafResult {
        std::thread::sleep(self.sleep);
        let runs = ctx.globals().get(self.counter).and_then(|v| v.as_i64()).unwrap_or(0);
        let _ = ctx.globals().set(self.counter, json!(runs + 1));
        Ok(LeafReturn::Id(0))
    }

    fn backward(&self, ctx: &mut LeafContext<'_>) {
        let _ = ctx.globals().set(&format!("{}.backward", self.counter), json!(true));
    }
}

pub fn tracking_leaf(id: &str, counter: &'static str, sleep: Duration) -> State {
    let mut state = State::execution(id).with_id(id);
    state.add_outcome("done").unwrap();
    state.with_body(TrackingLeaf { counter, sleep })
}

/// Hierarchy root with outcome 0 ("done") and the given children chained
/// by their outcome 0, the last one mapping onto the root outcome.
pub fn chain(children: Vec<State>) -> StateRef {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    let ids: Vec<StateId> = children.iter().map(|c| c.state_id().clone()).collect();
    for child in children {
        root.add_child(child).unwrap();
    }
    if let Some(first) = ids.first() {
        root.set_start_state(Some(first.clone())).unwrap();
    }
    for pair in ids.windows(2) {
        root.add_transition(Some(pair[0].clone()), Some(0), Some(pair[1].clone()), None).unwrap();
    }
    if let Some(last) = ids.last() {
        root.add_transition(Some(last.clone()), Some(0), None, Some(0)).unwrap();
    }
    root
}

pub fn machine(root: StateRef) -> Arc<StateMachine> {
    Arc::new(StateMachine::new(root).unwrap())
}

/// Run a machine to completion on a fresh engine; returns the outcome.
pub fn run(machine: &Arc<StateMachine>) -> Option<i64> {
    let engine = ExecutionEngine::new();
    run_on(&engine, machine)
}

pub fn run_on(engine: &ExecutionEngine, machine: &Arc<StateMachine>) -> Option<i64> {
    engine.start(Arc::clone(machine), None).unwrap();
    assert!(engine.join(Some(JOIN_BUDGET)), "machine did not finish in time");
    engine.outcome()
}

/// Every state of the tree, preorder.
pub fn all_states(root: &StateRef) -> Vec<StateRef> {
    let mut states = vec![root.clone()];
    let children = root.read().child_refs();
    for child in children {
        states.extend(all_states(&child));
    }
    states
}
