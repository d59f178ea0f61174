// SPDX-License-Identifier: MIT

//! Per-variant state execution.
//!
//! `run_state` is the worker body: set up the run, dispatch on the
//! variant, finalize. Containers and concurrency states spawn one worker
//! thread per child and wait on it or on a join queue; all locks are
//! released across those waits.

pub(crate) mod concurrency;
pub(crate) mod dataflow;
pub(crate) mod hierarchy;
pub(crate) mod leaf;
pub(crate) mod library;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::history::{HistoryItem, HistoryItemKind};
use machina_core::{
    ChangeEvent, ChangeKind, Clock, ExecutionStatus, RunId, StateId, StateKind, StateRef,
    OUTCOME_ABORTED,
};
use serde_json::json;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Message a finalizing child posts to its concurrency parent.
#[derive(Debug, Clone)]
pub(crate) struct JoinMessage {
    pub state_id: StateId,
    pub outcome: i64,
}

pub(crate) type JoinSender = crossbeam_channel::Sender<JoinMessage>;

#[derive(Debug, Clone, Copy)]
enum Variant {
    Execution,
    Hierarchy,
    Barrier,
    Preemptive,
    Library,
}

/// Run a state to its final outcome on the current thread. Returns `None`
/// only when a backward unwind walked out of the state.
pub(crate) fn run_state<C: Clock>(
    state: &StateRef,
    ctx: &Arc<ExecutionContext<C>>,
    notify: Option<&JoinSender>,
) -> Option<i64> {
    setup_run(state, ctx);
    record(state, ctx, HistoryItemKind::Call, None);

    let variant = {
        match state.read().kind() {
            StateKind::Execution(_) => Variant::Execution,
            StateKind::Hierarchy(_) => Variant::Hierarchy,
            StateKind::Barrier(_) => Variant::Barrier,
            StateKind::Preemptive(_) => Variant::Preemptive,
            StateKind::Library(_) => Variant::Library,
        }
    };
    let outcome = match variant {
        Variant::Execution => leaf::run_leaf(state, ctx),
        Variant::Hierarchy => hierarchy::run_hierarchy(state, ctx),
        Variant::Barrier => concurrency::run_barrier(state, ctx),
        Variant::Preemptive => concurrency::run_preemptive(state, ctx),
        Variant::Library => library::run_library(state, ctx),
    };

    finalize(state, ctx, outcome, notify);
    outcome
}

/// Spawn a worker thread running `run_state`.
pub(crate) fn start_worker<C: Clock>(
    state: StateRef,
    ctx: Arc<ExecutionContext<C>>,
    notify: Option<JoinSender>,
) -> Result<JoinHandle<Option<i64>>, EngineError> {
    let name = format!("machina-{}", state.read().state_id());
    std::thread::Builder::new()
        .name(name)
        .spawn(move || run_state(&state, &ctx, notify.as_ref()))
        .map_err(|e| EngineError::Spawn(e.to_string()))
}

fn setup_run<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) {
    let (latches, is_root) = {
        let state_guard = state.read();
        (state_guard.latches(), state_guard.parent().is_none())
    };
    latches.clear_preempted();
    if is_root {
        dataflow::seed_root_inputs(state, ctx);
    }
    {
        let mut s = state.write();
        s.run.final_outcome = None;
        s.run.run_id = Some(RunId::generate());
        let defaults = s.default_outputs();
        s.run.output_data = defaults;
    }
    set_status(state, ExecutionStatus::Active);
}

fn finalize<C: Clock>(
    state: &StateRef,
    ctx: &Arc<ExecutionContext<C>>,
    outcome: Option<i64>,
    notify: Option<&JoinSender>,
) {
    let (state_id, path, hooks) = {
        let mut s = state.write();
        s.run.final_outcome = outcome;
        s.run.status = ExecutionStatus::WaitForNextState;
        (s.state_id().clone(), s.path().clone(), s.hooks())
    };
    if let Some(h) = hooks {
        h.bus.emit(
            ChangeEvent::new(path, ChangeKind::Execution, "final_outcome").with_after(json!(outcome)),
        );
    }
    record(state, ctx, HistoryItemKind::Return, outcome);
    if let Some(tx) = notify {
        let _ = tx.send(JoinMessage { state_id, outcome: outcome.unwrap_or(OUTCOME_ABORTED) });
    }
}

/// Change a state's status, emitting the execution event outside the lock.
pub(crate) fn set_status(state: &StateRef, status: ExecutionStatus) {
    let mut s = state.write();
    let old = s.run.status;
    if old == status {
        return;
    }
    s.run.status = status;
    let hooks = s.hooks();
    let path = s.path().clone();
    drop(s);
    if let Some(h) = hooks {
        h.bus.emit(
            ChangeEvent::new(path, ChangeKind::Execution, "status")
                .with_before(json!(old.to_string()))
                .with_after(json!(status.to_string())),
        );
    }
}

pub(crate) fn record<C: Clock>(
    state: &StateRef,
    ctx: &Arc<ExecutionContext<C>>,
    kind: HistoryItemKind,
    outcome: Option<i64>,
) {
    let item = {
        let s = state.read();
        HistoryItem {
            kind,
            path: s.path().clone(),
            state_name: s.name().into(),
            run_id: s.run.run_id.clone(),
            outcome,
            at_ms: ctx.clock.epoch_ms(),
        }
    };
    ctx.history.record(item);
}
