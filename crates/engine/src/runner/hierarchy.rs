// SPDX-License-Identifier: MIT

//! Hierarchical container execution.
//!
//! One child runs at a time; the child's outcome selects the next child
//! or a container outcome via the transitions. The clearance gate before
//! every child entry is where pause, stepping and preemption take effect.

use crate::context::ExecutionContext;
use crate::engine::Clearance;
use crate::history::HistoryItemKind;
use crate::runner::{dataflow, set_status, start_worker};
use machina_core::state::recursively_preempt;
use machina_core::{
    Clock, ExecutedRecord, ExecutionStatus, StateKind, StateRef, OUTCOME_ABORTED,
    OUTCOME_PREEMPTED,
};
use std::sync::Arc;

pub(crate) fn run_hierarchy<C: Clock>(
    state: &StateRef,
    ctx: &Arc<ExecutionContext<C>>,
) -> Option<i64> {
    set_status(state, ExecutionStatus::ExecuteChildren);
    dataflow::init_scoped(state);

    let latches = state.read().latches();
    let mut current = match initial_child(state, ctx) {
        InitialChild::Empty => return Some(OUTCOME_ABORTED),
        InitialChild::Unresolvable => {
            tracing::error!(state = %state.read().name(), "start state does not resolve");
            return Some(OUTCOME_ABORTED);
        }
        InitialChild::Child(child) => child,
    };

    loop {
        let (child_id, depth) = {
            let c = current.read();
            (c.state_id().clone(), c.path().depth())
        };

        match ctx.engine.request_clearance(depth, &latches) {
            Clearance::Preempt => {
                preempt_children(state);
                return Some(OUTCOME_PREEMPTED);
            }
            Clearance::BackwardUnit => match backward_one(state, ctx) {
                Some(previous) => {
                    current = previous;
                    continue;
                }
                // History exhausted: leave backwards, computing no outcome.
                None => return None,
            },
            Clearance::Proceed => {}
        }
        if latches.preempted() {
            preempt_children(state);
            return Some(OUTCOME_PREEMPTED);
        }

        let scoped_before = {
            let s = state.read();
            s.kind().container().map(|c| c.scoped_data.clone()).unwrap_or_default()
        };
        dataflow::populate_child_inputs(state, &current, ctx);
        let handle = match start_worker(current.clone(), Arc::clone(ctx), None) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(error = %error, "failed to start child worker");
                return Some(OUTCOME_ABORTED);
            }
        };
        let outcome = handle.join().unwrap_or(Some(OUTCOME_ABORTED));
        let Some(outcome) = outcome else {
            // The child unwound backwards out of its own history; it counts
            // as not run, and a forward resume re-enters it.
            continue;
        };

        dataflow::propagate_child_outputs(state, &current);
        set_status(&current, ExecutionStatus::Inactive);
        {
            let mut s = state.write();
            if let Some(container) = s.kind_mut().container_mut() {
                container
                    .executed
                    .push(ExecutedRecord { state_id: child_id.clone(), scoped_before });
            }
        }

        let transition = {
            let s = state.read();
            s.kind().container().and_then(|c| c.find_transition(&child_id, outcome).cloned())
        };
        match transition {
            Some(transition) => match (transition.to_state, transition.to_outcome) {
                (Some(sibling), _) => {
                    let next = {
                        let s = state.read();
                        s.kind().container().and_then(|c| c.states.get(&sibling).cloned())
                    };
                    match next {
                        Some(next) => current = next,
                        None => {
                            tracing::error!(target_state = %sibling, "transition target missing");
                            return Some(OUTCOME_ABORTED);
                        }
                    }
                }
                (None, Some(container_outcome)) => {
                    dataflow::collect_container_outputs(state);
                    return Some(container_outcome);
                }
                (None, None) => return Some(OUTCOME_ABORTED),
            },
            None => {
                // No transition: reserved outcomes pass through, anything
                // else aborts the container.
                let final_outcome = if outcome == OUTCOME_ABORTED || outcome == OUTCOME_PREEMPTED {
                    outcome
                } else {
                    tracing::error!(
                        state = %state.read().name(),
                        child = %child_id,
                        outcome,
                        "no transition for outcome"
                    );
                    OUTCOME_ABORTED
                };
                dataflow::collect_container_outputs(state);
                return Some(final_outcome);
            }
        }
    }
}

enum InitialChild {
    Empty,
    Unresolvable,
    Child(StateRef),
}

fn initial_child<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) -> InitialChild {
    let s = state.read();
    let Some(container) = s.kind().container() else {
        return InitialChild::Unresolvable;
    };
    if container.states.is_empty() {
        return InitialChild::Empty;
    }
    let chosen = ctx
        .start_child_for(s.path())
        .and_then(|id| container.states.get(id))
        .or_else(|| container.start_state_id.as_ref().and_then(|id| container.states.get(id)));
    match chosen {
        Some(child) => InitialChild::Child(child.clone()),
        None => InitialChild::Unresolvable,
    }
}

/// Undo the most recent unit of this container's run: restore the scoped
/// snapshot and run the leaf inverse hook. A completed composite child
/// unwinds as one boundary step.
fn backward_one<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) -> Option<StateRef> {
    let (child, scoped_before) = {
        let s = state.read();
        let container = s.kind().container()?;
        let record = container.executed.last()?.clone();
        let child = container.states.get(&record.state_id)?.clone();
        (child, record.scoped_before)
    };
    let is_leaf = matches!(child.read().kind(), StateKind::Execution(_));
    if is_leaf {
        super::leaf::run_leaf_backward(&child, ctx);
    } else {
        super::record(&child, ctx, HistoryItemKind::BackwardCall, None);
        set_status(&child, ExecutionStatus::Inactive);
    }
    {
        let mut s = state.write();
        if let Some(container) = s.kind_mut().container_mut() {
            container.executed.pop();
            container.scoped_data = scoped_before;
        }
    }
    Some(child)
}

pub(crate) fn preempt_children(state: &StateRef) {
    for child in state.read().child_refs() {
        recursively_preempt(&child);
    }
}
