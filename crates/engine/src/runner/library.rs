// SPDX-License-Identifier: MIT

//! Library reference execution: delegate to the owned inner tree.

use crate::context::ExecutionContext;
use crate::runner::{set_status, start_worker};
use machina_core::{Clock, ExecutionStatus, StateKind, StateRef, OUTCOME_ABORTED};
use std::sync::Arc;

pub(crate) fn run_library<C: Clock>(state: &StateRef, ctx: &Arc<ExecutionContext<C>>) -> Option<i64> {
    let (inner, inputs) = {
        let s = state.read();
        let StateKind::Library(lib) = s.kind() else {
            return Some(OUTCOME_ABORTED);
        };
        (lib.inner.clone(), s.run.input_data.clone())
    };

    // Port names mirror the inner root, so the resolved inputs (runtime
    // overrides included) map across one to one.
    {
        inner.write().run.input_data = inputs;
    }
    let handle = match start_worker(inner.clone(), Arc::clone(ctx), None) {
        Ok(handle) => handle,
        Err(error) => {
            tracing::error!(error = %error, "failed to start library worker");
            return Some(OUTCOME_ABORTED);
        }
    };
    let outcome = handle.join().unwrap_or(Some(OUTCOME_ABORTED));
    let Some(inner_outcome) = outcome else {
        return None;
    };

    let outputs = { inner.read().run.output_data.clone() };
    {
        let mut s = state.write();
        for (name, value) in outputs {
            s.run.output_data.insert(name, value);
        }
    }
    set_status(&inner, ExecutionStatus::Inactive);

    // Outcome ids are mirrored at construction; match by name as a
    // fallback for re-keyed wrappers.
    let mapped = {
        let s = state.read();
        if s.outcomes().contains_key(&inner_outcome) {
            inner_outcome
        } else {
            let inner_guard = inner.read();
            inner_guard
                .outcomes()
                .get(&inner_outcome)
                .and_then(|outcome| s.outcome_by_name(&outcome.name))
                .map(|outcome| outcome.outcome_id)
                .unwrap_or(OUTCOME_ABORTED)
        }
    };
    Some(mapped)
}
