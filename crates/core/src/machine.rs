// SPDX-License-Identifier: MIT

//! State machine wrapper: one root state plus the shared hooks every
//! attached state uses to serialize structural mutations and publish
//! change events.

use crate::error::ModelError;
use crate::event::ObserverBus;
use crate::path::StatePath;
use crate::state::{self, State, StateRef};
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use thiserror::Error;

/// Shared per-machine services, propagated to every attached state.
#[derive(Debug, Default)]
pub struct Hooks {
    pub bus: ObserverBus,
    /// Guards all structural mutations, so editing a running machine
    /// serializes against execution-side bookkeeping. Reentrant because
    /// cascading operations nest.
    pub structural: ReentrantMutex<()>,
}

/// Failure to load a machine from its serialized form.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A validated state tree with its observer bus and structural lock.
#[derive(Debug)]
pub struct StateMachine {
    root: StateRef,
    hooks: Arc<Hooks>,
}

impl StateMachine {
    /// Wrap and validate a root state. The root must already satisfy the
    /// tree invariants; the hooks are wired through the whole tree.
    pub fn new(root: StateRef) -> Result<Self, ModelError> {
        root.read().validate()?;
        let hooks = Arc::new(Hooks::default());
        {
            let mut state = root.write();
            let path = StatePath::root(state.state_id().clone());
            state.set_path(path);
            state.set_hooks(Some(Arc::clone(&hooks)));
        }
        state::propagate_links(&root);
        Ok(Self { root, hooks })
    }

    pub fn root(&self) -> &StateRef {
        &self.root
    }

    pub fn bus(&self) -> &ObserverBus {
        &self.hooks.bus
    }

    pub fn hooks(&self) -> Arc<Hooks> {
        Arc::clone(&self.hooks)
    }

    /// Resolve an absolute `/`-joined path.
    pub fn find(&self, path: &StatePath) -> Option<StateRef> {
        state::find_state(&self.root, path)
    }

    /// Digest of the whole tree; see [`State::tree_hash`].
    pub fn tree_hash(&self) -> String {
        self.root.read().tree_hash()
    }

    /// Re-check the tree invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.root.read().validate()
    }

    /// Serialized form of the tree. Not a committed on-disk format; the
    /// persistence layer decides what to do with it.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.root)
    }

    /// Inverse of [`StateMachine::to_json`]. Leaf bodies come back as
    /// no-ops and must be rebound.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let root: State = serde_json::from_str(json)?;
        Ok(Self::new(StateRef::new(root))?)
    }
}
