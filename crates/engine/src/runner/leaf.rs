// SPDX-License-Identifier: MIT

//! Leaf execution: invoking the user-supplied body.

use crate::context::ExecutionContext;
use crate::history::HistoryItemKind;
use machina_core::{
    Clock, ExecutionStatus, LeafContext, LeafReturn, ScopedAccessor, StateKind, StateRef,
    OUTCOME_ABORTED, OUTCOME_PREEMPTED,
};
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub(crate) fn run_leaf<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) -> Option<i64> {
    let (body, inputs, input_ports, latches, parent, name) = {
        let s = state.read();
        let StateKind::Execution(data) = s.kind() else {
            return Some(OUTCOME_ABORTED);
        };
        (
            data.body.clone(),
            s.run.input_data.clone(),
            s.input_ports().clone(),
            s.latches(),
            s.parent(),
            s.name().to_string(),
        )
    };

    // Input validation: a value of the wrong declared type aborts the run.
    for port in input_ports.values() {
        if let Some(value) = inputs.get(port.name.as_str()) {
            if !port.data_type.accepts_value(value) {
                tracing::error!(
                    state = %name,
                    port = %port.name,
                    expected = %port.data_type,
                    "input value has wrong type"
                );
                set_error_output(
                    state,
                    format!("input '{}' expects {}", port.name, port.data_type),
                );
                return Some(OUTCOME_ABORTED);
            }
        }
    }

    let mut outputs = { state.read().run.output_data.clone() };
    let scoped = ScopedAccessor::new(parent.map(|p| p.downgrade()).unwrap_or_default());
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut leaf_ctx = LeafContext::new(&inputs, &mut outputs, &scoped, &ctx.globals, &latches);
        body.execute(&mut leaf_ctx)
    }));
    { state.write().run.output_data = outputs; }

    let outcome = match result {
        Err(payload) => {
            let text = panic_text(&payload);
            tracing::error!(state = %name, error = %text, "state body panicked");
            set_error_output(state, text);
            OUTCOME_ABORTED
        }
        Ok(Err(error)) => {
            tracing::error!(state = %name, error = %error, "state body raised");
            set_error_output(state, error.to_string());
            OUTCOME_ABORTED
        }
        Ok(Ok(returned)) => {
            if latches.preempted() {
                // A preempted state leaves on the preempted outcome no
                // matter what the body returned.
                OUTCOME_PREEMPTED
            } else {
                resolve_outcome(state, &name, returned)
            }
        }
    };

    if outcome != OUTCOME_ABORTED && outcome != OUTCOME_PREEMPTED {
        check_output_types(state, &name);
    }
    Some(outcome)
}

/// Backward pass: invoke the inverse hook; no outcome, no output checks.
pub(crate) fn run_leaf_backward<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) {
    super::set_status(state, ExecutionStatus::Active);
    let (body, inputs, latches, parent) = {
        let mut s = state.write();
        s.run.backward = true;
        let StateKind::Execution(data) = s.kind() else {
            return;
        };
        (data.body.clone(), s.run.input_data.clone(), s.latches(), s.parent())
    };
    let mut outputs = { state.read().run.output_data.clone() };
    let scoped = ScopedAccessor::new(parent.map(|p| p.downgrade()).unwrap_or_default());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut leaf_ctx = LeafContext::new(&inputs, &mut outputs, &scoped, &ctx.globals, &latches);
        body.backward(&mut leaf_ctx);
    }));
    if outcome.is_err() {
        tracing::error!(state = %state.read().name(), "backward hook panicked");
    }
    {
        let mut s = state.write();
        s.run.output_data = outputs;
        s.run.backward = false;
        s.run.status = ExecutionStatus::Inactive;
    }
    super::record(state, ctx, HistoryItemKind::BackwardCall, None);
}

fn resolve_outcome(state: &StateRef, name: &str, returned: LeafReturn) -> i64 {
    let s = state.read();
    match returned {
        LeafReturn::Id(id) if s.outcomes().contains_key(&id) => id,
        LeafReturn::Name(ref outcome_name) => match s.outcome_by_name(outcome_name) {
            Some(outcome) => outcome.outcome_id,
            None => {
                tracing::error!(state = %name, outcome = %outcome_name, "returned outcome does not exist");
                OUTCOME_ABORTED
            }
        },
        LeafReturn::Id(id) => {
            tracing::error!(state = %name, outcome = id, "returned outcome does not exist");
            OUTCOME_ABORTED
        }
    }
}

fn set_error_output(state: &StateRef, text: String) {
    state.write().run.output_data.insert("error".into(), json!(text));
}

fn check_output_types(state: &StateRef, name: &str) {
    let s = state.read();
    for port in s.output_ports().values() {
        if let Some(value) = s.run.output_data.get(port.name.as_str()) {
            if !port.data_type.accepts_value(value) {
                tracing::warn!(
                    state = %name,
                    port = %port.name,
                    expected = %port.data_type,
                    "output value has wrong type"
                );
            }
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "state body panicked".to_string()
    }
}
