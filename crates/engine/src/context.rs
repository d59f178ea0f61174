// SPDX-License-Identifier: MIT

//! Per-run execution context.
//!
//! An explicit bundle of the services a running state needs, threaded
//! through the runner instead of living in process singletons so tests
//! can build fresh isolates.

use crate::engine::ExecutionEngine;
use crate::history::ExecutionHistory;
use machina_core::{Clock, GlobalVariableStore, StatePath, SystemClock};
use std::sync::Arc;

/// Everything one run of a state machine shares.
pub struct ExecutionContext<C: Clock = SystemClock> {
    pub(crate) engine: ExecutionEngine<C>,
    pub globals: Arc<GlobalVariableStore>,
    pub history: Arc<ExecutionHistory>,
    /// Absolute path of the state to begin at, if the run was started with
    /// an override. Containers on the path launch only the targeted child.
    pub start_path: Option<StatePath>,
    pub(crate) clock: C,
}

impl<C: Clock> ExecutionContext<C> {
    pub(crate) fn new(
        engine: ExecutionEngine<C>,
        globals: Arc<GlobalVariableStore>,
        history: Arc<ExecutionHistory>,
        start_path: Option<StatePath>,
        clock: C,
    ) -> Self {
        Self { engine, globals, history, start_path, clock }
    }

    /// Child of the container at `container_path` selected by the start
    /// override, if the override points through it.
    pub(crate) fn start_child_for(&self, container_path: &StatePath) -> Option<&machina_core::StateId> {
        let start = self.start_path.as_ref()?;
        if !start.starts_with(container_path) {
            return None;
        }
        start.segment(container_path.depth())
    }
}
