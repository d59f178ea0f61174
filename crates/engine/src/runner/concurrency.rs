// SPDX-License-Identifier: MIT

//! Barrier and preemptive concurrency.
//!
//! Children run on their own workers and report through a shared join
//! queue. Barrier states wait for everyone, then let the decider classify;
//! preemptive states take the first finisher and preempt the rest. The
//! queue's FIFO discipline breaks ties.

use crate::context::ExecutionContext;
use crate::engine::Clearance;
use crate::error::EngineError;
use crate::runner::{dataflow, set_status, start_worker, JoinMessage, JoinSender};
use machina_core::state::recursively_preempt;
use machina_core::{
    Clock, ExecutionStatus, StateId, StateRef, Transition, Value, OUTCOME_ABORTED,
    OUTCOME_PREEMPTED,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Re-check interval for preemption while draining the join queue.
const DRAIN_POLL: Duration = Duration::from_millis(100);

struct LaunchedChild {
    id: StateId,
    state: StateRef,
    handle: JoinHandle<Option<i64>>,
}

pub(crate) fn run_barrier<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) -> Option<i64> {
    set_status(state, ExecutionStatus::ExecuteChildren);
    dataflow::init_scoped(state);
    let (latches, depth) = {
        let s = state.read();
        (s.latches(), s.path().depth() + 1)
    };

    let (children, decider, decider_id) = {
        let s = state.read();
        let Ok(container) = s.container() else {
            return Some(OUTCOME_ABORTED);
        };
        if container.states.is_empty() {
            return Some(OUTCOME_ABORTED);
        }
        let Some(decider_id) = container.decider_id.clone() else {
            tracing::error!(state = %s.name(), "barrier state has no decider");
            return Some(OUTCOME_ABORTED);
        };
        let Some(decider) = container.states.get(&decider_id).cloned() else {
            tracing::error!(state = %s.name(), decider = %decider_id, "decider does not resolve");
            return Some(OUTCOME_ABORTED);
        };
        let children: Vec<StateRef> = container
            .states
            .iter()
            .filter(|(id, _)| **id != decider_id)
            .map(|(_, child)| child.clone())
            .collect();
        (children, decider, decider_id)
    };

    match ctx.engine.request_clearance(depth, &latches) {
        Clearance::Preempt => return Some(OUTCOME_PREEMPTED),
        Clearance::BackwardUnit => return None,
        Clearance::Proceed => {}
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let launched = match launch(state, &children, ctx, &tx) {
        Ok(launched) => launched,
        Err(error) => {
            tracing::error!(error = %error, "failed to start barrier children");
            for child in &children {
                recursively_preempt(child);
            }
            return Some(OUTCOME_ABORTED);
        }
    };
    drop(tx);

    let mut outcomes: HashMap<StateId, i64> = HashMap::new();
    while outcomes.len() < launched.len() {
        match rx.recv_timeout(DRAIN_POLL) {
            Ok(message) => {
                if let Some(child) = launched.iter().find(|l| l.id == message.state_id) {
                    dataflow::propagate_child_outputs(state, &child.state);
                    set_status(&child.state, ExecutionStatus::Inactive);
                }
                outcomes.insert(message.state_id, message.outcome);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // Re-broadcast: a child entering its run clears its own
                // latch, so a one-shot signal could slip past it.
                if latches.preempted() {
                    for child in &launched {
                        recursively_preempt(&child.state);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    for child in launched {
        let _ = child.handle.join();
    }
    if latches.preempted() {
        return Some(OUTCOME_PREEMPTED);
    }

    // The decider classifies its siblings' results: outcomes and errors
    // are injected as inputs next to its regular data-flows.
    dataflow::populate_child_inputs(state, &decider, ctx);
    let child_errors = collect_child_errors(state, &outcomes);
    {
        let outcome_map: serde_json::Map<String, Value> =
            outcomes.iter().map(|(id, outcome)| (id.to_string(), json!(outcome))).collect();
        let mut d = decider.write();
        d.run.input_data.insert("child_outcomes".into(), Value::Object(outcome_map));
        d.run.input_data.insert("child_errors".into(), child_errors);
    }
    let handle = match start_worker(decider.clone(), Arc::clone(ctx), None) {
        Ok(handle) => handle,
        Err(error) => {
            tracing::error!(error = %error, "failed to start decider worker");
            return Some(OUTCOME_ABORTED);
        }
    };
    let decider_outcome = handle.join().unwrap_or(Some(OUTCOME_ABORTED));
    let Some(decider_outcome) = decider_outcome else {
        return None;
    };
    dataflow::propagate_child_outputs(state, &decider);
    set_status(&decider, ExecutionStatus::Inactive);

    let final_outcome = map_child_outcome(state, &decider_id, decider_outcome);
    dataflow::collect_container_outputs(state);
    Some(final_outcome)
}

pub(crate) fn run_preemptive<C: Clock>(
    state: &StateRef,
    ctx: &Arc<ExecutionContext<C>>,
) -> Option<i64> {
    set_status(state, ExecutionStatus::ExecuteChildren);
    dataflow::init_scoped(state);
    let (latches, depth) = {
        let s = state.read();
        (s.latches(), s.path().depth() + 1)
    };

    let children: Vec<StateRef> = {
        let s = state.read();
        let Ok(container) = s.container() else {
            return Some(OUTCOME_ABORTED);
        };
        if container.states.is_empty() {
            return Some(OUTCOME_ABORTED);
        }
        // A start-path override launches only the targeted child.
        match ctx.start_child_for(s.path()).and_then(|id| container.states.get(id)) {
            Some(only) => vec![only.clone()],
            None => container.states.values().cloned().collect(),
        }
    };

    match ctx.engine.request_clearance(depth, &latches) {
        Clearance::Preempt => return Some(OUTCOME_PREEMPTED),
        Clearance::BackwardUnit => return None,
        Clearance::Proceed => {}
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let launched = match launch(state, &children, ctx, &tx) {
        Ok(launched) => launched,
        Err(error) => {
            tracing::error!(error = %error, "failed to start preemptive children");
            for child in &children {
                recursively_preempt(child);
            }
            return Some(OUTCOME_ABORTED);
        }
    };
    drop(tx);

    let mut winner: Option<JoinMessage> = None;
    let mut received = 0usize;
    while received < launched.len() {
        match rx.recv_timeout(DRAIN_POLL) {
            Ok(message) => {
                received += 1;
                if winner.is_none() {
                    // First finisher wins; everyone else exits on the
                    // preempted outcome at their next suspension point.
                    for child in launched.iter().filter(|l| l.id != message.state_id) {
                        recursively_preempt(&child.state);
                    }
                    winner = Some(message);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // Re-broadcast: a slow-to-start child clears its latch in
                // its own setup, so a one-shot signal could slip past it.
                if latches.preempted() {
                    for child in &launched {
                        recursively_preempt(&child.state);
                    }
                } else if let Some(winner) = &winner {
                    for child in launched.iter().filter(|l| l.id != winner.state_id) {
                        recursively_preempt(&child.state);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    let winner_state = winner
        .as_ref()
        .and_then(|w| launched.iter().find(|l| l.id == w.state_id).map(|l| l.state.clone()));
    for child in launched {
        let _ = child.handle.join();
        set_status(&child.state, ExecutionStatus::Inactive);
    }
    if latches.preempted() {
        return Some(OUTCOME_PREEMPTED);
    }
    let (Some(winner), Some(winner_state)) = (winner, winner_state) else {
        return Some(OUTCOME_ABORTED);
    };

    dataflow::propagate_child_outputs(state, &winner_state);
    let final_outcome = map_child_outcome(state, &winner.state_id, winner.outcome);
    dataflow::collect_container_outputs(state);
    Some(final_outcome)
}

fn launch<C: Clock>(
    parent: &StateRef,
    children: &[StateRef],
    ctx: &Arc<ExecutionContext<C>>,
    tx: &JoinSender,
) -> Result<Vec<LaunchedChild>, EngineError> {
    children
        .iter()
        .map(|child| {
            dataflow::populate_child_inputs(parent, child, ctx);
            let id = child.read().state_id().clone();
            start_worker(child.clone(), Arc::clone(ctx), Some(tx.clone()))
                .map(|handle| LaunchedChild { id, state: child.clone(), handle })
        })
        .collect()
}

/// Error outputs of the finished children, keyed by state id.
fn collect_child_errors(state: &StateRef, outcomes: &HashMap<StateId, i64>) -> Value {
    let s = state.read();
    let Some(container) = s.kind().container() else {
        return json!({});
    };
    let map: serde_json::Map<String, Value> = outcomes
        .keys()
        .filter_map(|id| {
            let child = container.states.get(id)?;
            let error = child.read().run.output_data.get("error")?.clone();
            (!error.is_null()).then(|| (id.to_string(), error))
        })
        .collect();
    Value::Object(map)
}

/// Map a child's outcome onto the container per its transitions; reserved
/// outcomes pass through, everything else aborts.
fn map_child_outcome(state: &StateRef, child_id: &StateId, outcome: i64) -> i64 {
    let transition = {
        let s = state.read();
        s.kind().container().and_then(|c| c.find_transition(child_id, outcome).cloned())
    };
    match transition {
        Some(Transition { to_state: None, to_outcome: Some(target), .. }) => target,
        Some(_) => {
            tracing::warn!(
                child = %child_id,
                "concurrency transitions must target a container outcome"
            );
            OUTCOME_ABORTED
        }
        None if outcome == OUTCOME_ABORTED || outcome == OUTCOME_PREEMPTED => outcome,
        None => {
            tracing::error!(child = %child_id, outcome, "no transition for outcome");
            OUTCOME_ABORTED
        }
    }
}
