// SPDX-License-Identifier: MIT

//! Leaf execution states: the interface a user-supplied body exposes.

use crate::globals::GlobalVariableStore;
use crate::latch::LatchBlock;
use crate::state::{StateKind, WeakStateRef};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;
use std::time::Duration;

/// Error raised by a leaf body; routed to the reserved aborted outcome
/// with its text placed at the `error` output port.
pub type LeafError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a leaf body hands back: an outcome id or an outcome name, resolved
/// against the state's outcome set.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafReturn {
    Id(i64),
    Name(String),
}

impl From<i64> for LeafReturn {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for LeafReturn {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for LeafReturn {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

pub type LeafResult = Result<LeafReturn, LeafError>;

/// User-supplied procedure of an execution state.
///
/// `execute` runs on the state's worker thread and may block; it should
/// check [`LeafContext::preempted`] or use [`LeafContext::preemptive_wait`]
/// around long waits. `backward` is the optional inverse hook used by
/// backward stepping; outcomes are not computed there.
pub trait Leaf: Send + Sync {
    fn execute(&self, ctx: &mut LeafContext<'_>) -> LeafResult;

    fn backward(&self, _ctx: &mut LeafContext<'_>) {}
}

impl<F> Leaf for F
where
    F: Fn(&mut LeafContext<'_>) -> LeafResult + Send + Sync,
{
    fn execute(&self, ctx: &mut LeafContext<'_>) -> LeafResult {
        self(ctx)
    }
}

/// Execution environment handed to a leaf body.
pub struct LeafContext<'a> {
    inputs: &'a IndexMap<SmolStr, Value>,
    outputs: &'a mut IndexMap<SmolStr, Value>,
    scoped: &'a ScopedAccessor,
    globals: &'a GlobalVariableStore,
    latches: &'a LatchBlock,
}

impl<'a> LeafContext<'a> {
    pub fn new(
        inputs: &'a IndexMap<SmolStr, Value>,
        outputs: &'a mut IndexMap<SmolStr, Value>,
        scoped: &'a ScopedAccessor,
        globals: &'a GlobalVariableStore,
        latches: &'a LatchBlock,
    ) -> Self {
        Self { inputs, outputs, scoped, globals, latches }
    }

    pub fn inputs(&self) -> &IndexMap<SmolStr, Value> {
        self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn set_output(&mut self, name: &str, value: Value) {
        self.outputs.insert(SmolStr::new(name), value);
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Scoped variables of the enclosing container.
    pub fn scoped(&self) -> &ScopedAccessor {
        self.scoped
    }

    pub fn globals(&self) -> &GlobalVariableStore {
        self.globals
    }

    /// True once the state has been cooperatively cancelled.
    pub fn preempted(&self) -> bool {
        self.latches.preempted()
    }

    /// Sleep up to `duration`; returns `true` iff preempted first. Paused
    /// time does not count against the budget.
    pub fn preemptive_wait(&self, duration: Duration) -> bool {
        self.latches.preemptive_wait(duration)
    }
}

/// Accessor for the scoped variables of the parent container, usable from
/// a leaf body without holding any tree lock.
#[derive(Debug, Clone, Default)]
pub struct ScopedAccessor {
    parent: WeakStateRef,
}

impl ScopedAccessor {
    pub fn new(parent: WeakStateRef) -> Self {
        Self { parent }
    }

    /// Snapshot of a scoped variable's current value.
    pub fn get(&self, name: &str) -> Option<Value> {
        let parent = self.parent.upgrade()?;
        let state = parent.read();
        match state.kind() {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => {
                c.scoped_data.get(name).cloned()
            }
            _ => None,
        }
    }

    /// Overwrite a scoped variable; returns `false` if the container has no
    /// variable of that name.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let Some(parent) = self.parent.upgrade() else {
            return false;
        };
        let mut state = parent.write();
        match state.kind_mut() {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => {
                if !c.scoped_variables.values().any(|v| v.name == name) {
                    return false;
                }
                c.scoped_data.insert(SmolStr::new(name), value);
                true
            }
            _ => false,
        }
    }
}

/// Shareable handle to a leaf body. Not serialized; a deserialized
/// execution state carries a no-op body until rebound.
#[derive(Clone)]
pub struct LeafHandle(Arc<dyn Leaf>);

impl LeafHandle {
    pub fn new(leaf: impl Leaf + 'static) -> Self {
        Self(Arc::new(leaf))
    }

    pub fn from_arc(leaf: Arc<dyn Leaf>) -> Self {
        Self(leaf)
    }

    pub fn execute(&self, ctx: &mut LeafContext<'_>) -> LeafResult {
        self.0.execute(ctx)
    }

    pub fn backward(&self, ctx: &mut LeafContext<'_>) {
        self.0.backward(ctx)
    }
}

impl Default for LeafHandle {
    fn default() -> Self {
        Self::new(NoopLeaf)
    }
}

impl std::fmt::Debug for LeafHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LeafHandle")
    }
}

/// Placeholder body: succeeds with outcome id 0.
struct NoopLeaf;

impl Leaf for NoopLeaf {
    fn execute(&self, _ctx: &mut LeafContext<'_>) -> LeafResult {
        Ok(LeafReturn::Id(0))
    }
}

/// Payload of an execution state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionData {
    #[serde(skip)]
    pub body: LeafHandle,
}
