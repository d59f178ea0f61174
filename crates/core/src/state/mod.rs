// SPDX-License-Identifier: MIT

//! The polymorphic state tree.
//!
//! A [`State`] is one node: execution leaf, hierarchical container,
//! barrier or preemptive concurrency container, or library reference.
//! Ownership flows parent to child through [`StateRef`]; parent links are
//! weak. Mutations go through the [`StateRef`] operations, which take the
//! machine's structural lock, validate, apply, and emit a change event,
//! or through plain [`State`] methods while a state is still detached.

pub mod container;
pub mod execution;
pub mod library;

pub use container::{ContainerData, ExecutedRecord};
pub use execution::ExecutionData;
pub use library::LibraryData;

use crate::error::{check_name_legal, ElementKind, ModelError};
use crate::event::{ChangeEvent, ChangeKind};
use crate::id::{RunId, StateId};
use crate::latch::LatchBlock;
use crate::machine::Hooks;
use crate::outcome::{is_reserved_outcome, Outcome};
use crate::path::StatePath;
use crate::port::DataPort;
use crate::value::{DataType, Value};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Execution status of a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Inactive,
    Active,
    ExecuteChildren,
    WaitForNextState,
}

crate::simple_display! {
    ExecutionStatus {
        Inactive => "inactive",
        Active => "active",
        ExecuteChildren => "execute_children",
        WaitForNextState => "wait_for_next_state",
    }
}

/// Per-activation data, owned by the state's current run.
#[derive(Debug, Default)]
pub struct RunData {
    pub status: ExecutionStatus,
    pub input_data: IndexMap<SmolStr, Value>,
    pub output_data: IndexMap<SmolStr, Value>,
    pub final_outcome: Option<i64>,
    pub run_id: Option<RunId>,
    pub backward: bool,
}

/// Variant payload of a state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
    Execution(ExecutionData),
    Hierarchy(ContainerData),
    Barrier(ContainerData),
    Preemptive(ContainerData),
    Library(LibraryData),
}

impl StateKind {
    pub fn is_container(&self) -> bool {
        matches!(self, StateKind::Hierarchy(_) | StateKind::Barrier(_) | StateKind::Preemptive(_))
    }

    pub fn container(&self) -> Option<&ContainerData> {
        match self {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => Some(c),
            _ => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut ContainerData> {
        match self {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => Some(c),
            _ => None,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            StateKind::Execution(_) => "execution",
            StateKind::Hierarchy(_) => "hierarchy",
            StateKind::Barrier(_) => "barrier",
            StateKind::Preemptive(_) => "preemptive",
            StateKind::Library(_) => "library",
        }
    }

    fn deep_clone(&self) -> StateKind {
        match self {
            // Leaf bodies are shared between clones.
            StateKind::Execution(d) => StateKind::Execution(d.clone()),
            StateKind::Hierarchy(c) => StateKind::Hierarchy(c.deep_clone()),
            StateKind::Barrier(c) => StateKind::Barrier(c.deep_clone()),
            StateKind::Preemptive(c) => StateKind::Preemptive(c.deep_clone()),
            StateKind::Library(l) => StateKind::Library(l.deep_clone()),
        }
    }
}

/// One node of the state tree.
#[derive(Debug, Serialize, Deserialize)]
pub struct State {
    state_id: StateId,
    name: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    input_ports: IndexMap<i64, DataPort>,
    #[serde(default)]
    output_ports: IndexMap<i64, DataPort>,
    outcomes: IndexMap<i64, Outcome>,
    kind: StateKind,
    #[serde(skip)]
    parent: WeakStateRef,
    #[serde(skip)]
    path: StatePath,
    #[serde(skip)]
    pub run: RunData,
    #[serde(skip)]
    latches: Arc<LatchBlock>,
    #[serde(skip)]
    hooks: Option<Arc<Hooks>>,
}

impl State {
    fn new(name: &str, kind: StateKind) -> Self {
        let state_id = crate::id::generate_state_id(&HashSet::new());
        let mut outcomes = IndexMap::new();
        outcomes.insert(Outcome::aborted().outcome_id, Outcome::aborted());
        outcomes.insert(Outcome::preempted().outcome_id, Outcome::preempted());
        Self {
            path: StatePath::root(state_id.clone()),
            state_id,
            name: SmolStr::new(name),
            description: None,
            input_ports: IndexMap::new(),
            output_ports: IndexMap::new(),
            outcomes,
            kind,
            parent: WeakStateRef::default(),
            run: RunData::default(),
            latches: Arc::new(LatchBlock::new()),
            hooks: None,
        }
    }

    /// Leaf state with a no-op body; bind the real one with
    /// [`State::bind_body`].
    pub fn execution(name: &str) -> Self {
        Self::new(name, StateKind::Execution(ExecutionData::default()))
    }

    pub fn hierarchy(name: &str) -> Self {
        Self::new(name, StateKind::Hierarchy(ContainerData::default()))
    }

    pub fn barrier(name: &str) -> Self {
        Self::new(name, StateKind::Barrier(ContainerData::default()))
    }

    pub fn preemptive(name: &str) -> Self {
        Self::new(name, StateKind::Preemptive(ContainerData::default()))
    }

    /// Replace the generated state id while detached.
    pub fn with_id(mut self, state_id: impl Into<StateId>) -> Self {
        self.state_id = state_id.into();
        self.path = StatePath::root(self.state_id.clone());
        self
    }

    /// Attach a leaf body (execution states only).
    pub fn bind_body(&mut self, body: impl execution::Leaf + 'static) -> Result<(), ModelError> {
        match &mut self.kind {
            StateKind::Execution(data) => {
                data.body = execution::LeafHandle::new(body);
                Ok(())
            }
            _ => Err(ModelError::WrongVariant {
                state: self.name.to_string(),
                expected: "execution",
            }),
        }
    }

    /// Builder-style [`State::bind_body`] for detached construction.
    pub fn with_body(mut self, body: impl execution::Leaf + 'static) -> Self {
        if let StateKind::Execution(data) = &mut self.kind {
            data.body = execution::LeafHandle::new(body);
        }
        self
    }

    // -- accessors --

    pub fn state_id(&self) -> &StateId {
        &self.state_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn path(&self) -> &StatePath {
        &self.path
    }

    pub fn parent(&self) -> Option<StateRef> {
        self.parent.upgrade()
    }

    pub fn latches(&self) -> Arc<LatchBlock> {
        Arc::clone(&self.latches)
    }

    pub fn hooks(&self) -> Option<Arc<Hooks>> {
        self.hooks.clone()
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut StateKind {
        &mut self.kind
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Container payload, or `NotAContainer`.
    pub fn container(&self) -> Result<&ContainerData, ModelError> {
        self.kind.container().ok_or_else(|| ModelError::NotAContainer { state: self.name.to_string() })
    }

    pub fn container_mut(&mut self) -> Result<&mut ContainerData, ModelError> {
        let name = self.name.to_string();
        self.kind.container_mut().ok_or(ModelError::NotAContainer { state: name })
    }

    pub fn input_ports(&self) -> &IndexMap<i64, DataPort> {
        &self.input_ports
    }

    pub fn output_ports(&self) -> &IndexMap<i64, DataPort> {
        &self.output_ports
    }

    pub fn outcomes(&self) -> &IndexMap<i64, Outcome> {
        &self.outcomes
    }

    pub fn input_port_by_name(&self, name: &str) -> Option<&DataPort> {
        self.input_ports.values().find(|p| p.name == name)
    }

    pub fn output_port_by_name(&self, name: &str) -> Option<&DataPort> {
        self.output_ports.values().find(|p| p.name == name)
    }

    pub fn outcome_by_name(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.values().find(|o| o.name == name)
    }

    /// Default for an input port, honoring library runtime overrides.
    pub fn default_input(&self, port: &DataPort) -> Value {
        if let StateKind::Library(lib) = &self.kind {
            if lib.use_runtime_value.get(&port.port_id).copied().unwrap_or(false) {
                if let Some(value) = lib.runtime_values.get(&port.port_id) {
                    return value.clone();
                }
            }
        }
        port.default_value.clone().unwrap_or(Value::Null)
    }

    /// Output buffer pre-filled with port defaults.
    pub fn default_outputs(&self) -> IndexMap<SmolStr, Value> {
        self.output_ports
            .values()
            .map(|p| (p.name.clone(), p.default_value.clone().unwrap_or(Value::Null)))
            .collect()
    }

    /// Direct children, including a library's inner tree.
    pub fn child_refs(&self) -> Vec<StateRef> {
        match &self.kind {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => {
                c.states.values().cloned().collect()
            }
            StateKind::Library(l) => vec![l.inner.clone()],
            StateKind::Execution(_) => Vec::new(),
        }
    }

    pub fn child(&self, state_id: &StateId) -> Option<StateRef> {
        match &self.kind {
            StateKind::Hierarchy(c) | StateKind::Barrier(c) | StateKind::Preemptive(c) => {
                c.states.get(state_id).cloned()
            }
            StateKind::Library(l) => {
                (l.inner.read().state_id == *state_id).then(|| l.inner.clone())
            }
            StateKind::Execution(_) => None,
        }
    }

    // -- detached mutation (no events; see the StateRef operations) --

    pub fn set_name(&mut self, name: &str) -> Result<SmolStr, ModelError> {
        check_name_legal(name)?;
        let old = std::mem::replace(&mut self.name, SmolStr::new(name));
        Ok(old)
    }

    pub fn add_input_port(
        &mut self,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        self.add_port(PortSlot::Input, None, name, data_type, default)
    }

    pub fn add_output_port(
        &mut self,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        self.add_port(PortSlot::Output, None, name, data_type, default)
    }

    pub fn add_input_port_with_id(
        &mut self,
        port_id: i64,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        self.add_port(PortSlot::Input, Some(port_id), name, data_type, default)
    }

    pub fn add_output_port_with_id(
        &mut self,
        port_id: i64,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        self.add_port(PortSlot::Output, Some(port_id), name, data_type, default)
    }

    fn add_port(
        &mut self,
        slot: PortSlot,
        port_id: Option<i64>,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        check_name_legal(name)?;
        let kind = slot.element_kind();
        let ports = match slot {
            PortSlot::Input => &self.input_ports,
            PortSlot::Output => &self.output_ports,
        };
        if ports.values().any(|p| p.name == name) {
            return Err(ModelError::duplicate_name(kind, name));
        }
        let port_id = match port_id {
            Some(id) => {
                if self.port_id_taken(id) {
                    return Err(ModelError::duplicate_id(kind, id));
                }
                id
            }
            None => crate::id::next_element_id(self.all_port_ids()),
        };
        if let Some(value) = &default {
            if !data_type.accepts_value(value) {
                return Err(ModelError::TypeMismatch {
                    from_type: DataType::of_value(value),
                    target: data_type,
                });
            }
        }
        let mut port = DataPort::new(port_id, name, data_type);
        port.default_value = default;
        match slot {
            PortSlot::Input => self.input_ports.insert(port_id, port),
            PortSlot::Output => self.output_ports.insert(port_id, port),
        };
        Ok(port_id)
    }

    pub fn add_outcome(&mut self, name: &str) -> Result<i64, ModelError> {
        self.add_outcome_inner(None, name)
    }

    pub fn add_outcome_with_id(&mut self, outcome_id: i64, name: &str) -> Result<i64, ModelError> {
        self.add_outcome_inner(Some(outcome_id), name)
    }

    fn add_outcome_inner(&mut self, outcome_id: Option<i64>, name: &str) -> Result<i64, ModelError> {
        check_name_legal(name)?;
        if self.outcomes.values().any(|o| o.name == name) {
            return Err(ModelError::duplicate_name(ElementKind::Outcome, name));
        }
        let outcome_id = match outcome_id {
            Some(id) => {
                if self.outcomes.contains_key(&id) {
                    return Err(ModelError::duplicate_id(ElementKind::Outcome, id));
                }
                id
            }
            None => crate::id::next_element_id(self.outcomes.keys().copied()),
        };
        self.outcomes.insert(outcome_id, Outcome::new(outcome_id, name));
        Ok(outcome_id)
    }

    pub(crate) fn take_outcome(&mut self, outcome_id: i64, force: bool) -> Result<Outcome, ModelError> {
        if is_reserved_outcome(outcome_id) && !force {
            return Err(ModelError::ReservedElement { kind: ElementKind::Outcome, id: outcome_id.to_string() });
        }
        self.outcomes
            .shift_remove(&outcome_id)
            .ok_or_else(|| ModelError::unknown(ElementKind::Outcome, outcome_id))
    }

    pub(crate) fn take_input_port(&mut self, port_id: i64) -> Result<DataPort, ModelError> {
        self.input_ports
            .shift_remove(&port_id)
            .ok_or_else(|| ModelError::unknown(ElementKind::InputPort, port_id))
    }

    pub(crate) fn take_output_port(&mut self, port_id: i64) -> Result<DataPort, ModelError> {
        self.output_ports
            .shift_remove(&port_id)
            .ok_or_else(|| ModelError::unknown(ElementKind::OutputPort, port_id))
    }

    pub(crate) fn port_id_taken(&self, id: i64) -> bool {
        self.input_ports.contains_key(&id)
            || self.output_ports.contains_key(&id)
            || self
                .kind
                .container()
                .is_some_and(|c| c.scoped_variables.contains_key(&id))
    }

    pub(crate) fn all_port_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.input_ports.keys().copied().collect();
        ids.extend(self.output_ports.keys().copied());
        if let Some(c) = self.kind.container() {
            ids.extend(c.scoped_variables.keys().copied());
        }
        ids
    }

    /// Deep structural copy: fresh latches and run data, shared leaf
    /// bodies, no parent, no hooks.
    pub fn deep_clone(&self) -> State {
        State {
            state_id: self.state_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            input_ports: self.input_ports.clone(),
            output_ports: self.output_ports.clone(),
            outcomes: self.outcomes.clone(),
            kind: self.kind.deep_clone(),
            parent: WeakStateRef::default(),
            path: StatePath::root(self.state_id.clone()),
            run: RunData::default(),
            latches: Arc::new(LatchBlock::new()),
            hooks: None,
        }
    }

    /// SHA-256 over the canonical serialized tree. Stable across runs;
    /// ignores run data, latches and leaf bodies.
    pub fn tree_hash(&self) -> String {
        let canonical = serde_json::to_value(self).unwrap_or(Value::Null).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Check the whole subtree's invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        container::validate_state(self)
    }

    pub(crate) fn set_parent(&mut self, parent: WeakStateRef) {
        self.parent = parent;
    }

    pub(crate) fn set_path(&mut self, path: StatePath) {
        self.path = path;
    }

    pub(crate) fn set_hooks(&mut self, hooks: Option<Arc<Hooks>>) {
        self.hooks = hooks;
    }

    pub(crate) fn set_state_id(&mut self, state_id: StateId) {
        self.state_id = state_id;
    }
}

#[derive(Clone, Copy)]
enum PortSlot {
    Input,
    Output,
}

impl PortSlot {
    fn element_kind(self) -> ElementKind {
        match self {
            PortSlot::Input => ElementKind::InputPort,
            PortSlot::Output => ElementKind::OutputPort,
        }
    }
}

/// Shared handle to a state.
#[derive(Clone)]
pub struct StateRef(Arc<RwLock<State>>);

impl StateRef {
    pub fn new(state: State) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, State> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.0.write()
    }

    pub fn downgrade(&self) -> WeakStateRef {
        WeakStateRef(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &StateRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn hooks(&self) -> Option<Arc<Hooks>> {
        self.read().hooks.clone()
    }
}

impl std::fmt::Debug for StateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_read() {
            Some(state) => write!(f, "StateRef({})", state.state_id),
            None => f.write_str("StateRef(<locked>)"),
        }
    }
}

impl Serialize for StateRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(StateRef::new(State::deserialize(deserializer)?))
    }
}

/// Weak back-reference from a child to its parent.
#[derive(Clone, Default)]
pub struct WeakStateRef(Weak<RwLock<State>>);

impl WeakStateRef {
    pub fn upgrade(&self) -> Option<StateRef> {
        self.0.upgrade().map(StateRef)
    }
}

impl std::fmt::Debug for WeakStateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakStateRef")
    }
}

// -- observed element operations --

impl StateRef {
    /// Rename the state.
    pub fn set_name(&self, name: &str) -> Result<(), ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (old, subject) = {
            let mut state = self.write();
            let old = state.set_name(name)?;
            (old, state.path.clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "name")
                    .with_before(json!(old.as_str()))
                    .with_after(json!(name)),
            );
        }
        Ok(())
    }

    /// Add an input port.
    pub fn add_input_port(
        &self,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (port_id, subject) = {
            let mut state = self.write();
            let id = state.add_input_port(name, data_type, default)?;
            (id, state.path.clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::InputPort, "add_input_port")
                    .with_after(json!({ "port_id": port_id, "name": name })),
            );
        }
        Ok(port_id)
    }

    /// Add an output port.
    pub fn add_output_port(
        &self,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (port_id, subject) = {
            let mut state = self.write();
            let id = state.add_output_port(name, data_type, default)?;
            (id, state.path.clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::OutputPort, "add_output_port")
                    .with_after(json!({ "port_id": port_id, "name": name })),
            );
        }
        Ok(port_id)
    }

    /// Remove an input port; data-flows touching it go first.
    pub fn remove_input_port(&self, port_id: i64) -> Result<DataPort, ModelError> {
        self.remove_port(PortSlot::Input, port_id)
    }

    /// Remove an output port; data-flows touching it go first.
    pub fn remove_output_port(&self, port_id: i64) -> Result<DataPort, ModelError> {
        self.remove_port(PortSlot::Output, port_id)
    }

    fn remove_port(&self, slot: PortSlot, port_id: i64) -> Result<DataPort, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (self_id, parent, exists) = {
            let state = self.read();
            let exists = match slot {
                PortSlot::Input => state.input_ports.contains_key(&port_id),
                PortSlot::Output => state.output_ports.contains_key(&port_id),
            };
            (state.state_id.clone(), state.parent.upgrade(), exists)
        };
        if !exists {
            return Err(ModelError::unknown(slot.element_kind(), port_id));
        }
        let mut dropped_flows = 0;
        if let Some(parent) = parent {
            let mut p = parent.write();
            if let Some(c) = p.kind.container_mut() {
                dropped_flows += c.remove_data_flows_touching(&self_id, port_id).len();
            }
        }
        let (port, subject) = {
            let mut state = self.write();
            if let Some(c) = state.kind.container_mut() {
                dropped_flows += c.remove_data_flows_touching(&self_id, port_id).len();
            }
            let port = match slot {
                PortSlot::Input => state.take_input_port(port_id)?,
                PortSlot::Output => state.take_output_port(port_id)?,
            };
            (port, state.path.clone())
        };
        if let Some(h) = &hooks {
            let property = match slot {
                PortSlot::Input => "remove_input_port",
                PortSlot::Output => "remove_output_port",
            };
            h.bus.emit(
                ChangeEvent::new(subject, slot_change_kind(slot), property)
                    .with_before(json!({ "port_id": port_id, "name": port.name.as_str() }))
                    .with_info(format!("removed {dropped_flows} data flow(s)")),
            );
        }
        Ok(port)
    }

    /// Add an outcome.
    pub fn add_outcome(&self, name: &str) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (outcome_id, subject) = {
            let mut state = self.write();
            let id = state.add_outcome(name)?;
            (id, state.path.clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::Outcome, "add_outcome")
                    .with_after(json!({ "outcome_id": outcome_id, "name": name })),
            );
        }
        Ok(outcome_id)
    }

    /// Remove an outcome; transitions originating from it go first.
    /// Reserved outcomes are refused.
    pub fn remove_outcome(&self, outcome_id: i64) -> Result<Outcome, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (self_id, parent) = {
            let state = self.read();
            if !state.outcomes.contains_key(&outcome_id) {
                return Err(ModelError::unknown(ElementKind::Outcome, outcome_id));
            }
            if is_reserved_outcome(outcome_id) {
                return Err(ModelError::ReservedElement {
                    kind: ElementKind::Outcome,
                    id: outcome_id.to_string(),
                });
            }
            (state.state_id.clone(), state.parent.upgrade())
        };
        let mut dropped = 0;
        if let Some(parent) = parent {
            let mut p = parent.write();
            if let Some(c) = p.kind.container_mut() {
                dropped += c.remove_transitions_from(&self_id, outcome_id).len();
            }
        }
        let (outcome, subject) = {
            let mut state = self.write();
            if let Some(c) = state.kind.container_mut() {
                dropped += c.remove_transitions_to_own_outcome(outcome_id).len();
            }
            let outcome = state.take_outcome(outcome_id, false)?;
            (outcome, state.path.clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::Outcome, "remove_outcome")
                    .with_before(json!({ "outcome_id": outcome_id, "name": outcome.name.as_str() }))
                    .with_info(format!("removed {dropped} transition(s)")),
            );
        }
        Ok(outcome)
    }
}

fn slot_change_kind(slot: PortSlot) -> ChangeKind {
    match slot {
        PortSlot::Input => ChangeKind::InputPort,
        PortSlot::Output => ChangeKind::OutputPort,
    }
}

// -- tree walking --

/// Re-point parent links, cached paths and hooks below `node`, taking the
/// node's own fields as ground truth.
pub(crate) fn propagate_links(node: &StateRef) {
    let (path, hooks, children) = {
        let state = node.read();
        (state.path.clone(), state.hooks.clone(), state.child_refs())
    };
    for child in children {
        {
            let mut c = child.write();
            let child_path = path.join(c.state_id.clone());
            c.path = child_path;
            c.parent = node.downgrade();
            c.hooks = hooks.clone();
        }
        propagate_links(&child);
    }
}

/// Detach `node` from any parent: clears hooks below it and resets its
/// path to a fresh root.
pub(crate) fn clear_links(node: &StateRef) {
    {
        let mut state = node.write();
        state.parent = WeakStateRef::default();
        state.path = StatePath::root(state.state_id.clone());
        state.hooks = None;
    }
    propagate_links(node);
}

/// Resolve a `/`-joined path starting at `root`.
pub fn find_state(root: &StateRef, path: &StatePath) -> Option<StateRef> {
    let first = path.segment(0)?;
    if root.read().state_id != *first {
        return None;
    }
    let mut current = root.clone();
    for segment in path.iter().skip(1) {
        let next = current.read().child(segment)?;
        current = next;
    }
    Some(current)
}

/// Set the preempted latch on `node` and every descendant.
pub fn recursively_preempt(node: &StateRef) {
    let (latches, children) = {
        let state = node.read();
        (state.latches(), state.child_refs())
    };
    latches.set_preempted();
    for child in children {
        recursively_preempt(&child);
    }
}

/// Pause `node` and every descendant.
pub fn recursively_pause(node: &StateRef) {
    let (latches, children) = {
        let state = node.read();
        (state.latches(), state.child_refs())
    };
    latches.pause();
    for child in children {
        recursively_pause(&child);
    }
}

/// Resume `node` and every descendant.
pub fn recursively_resume(node: &StateRef) {
    let (latches, children) = {
        let state = node.read();
        (state.latches(), state.child_refs())
    };
    latches.resume();
    for child in children {
        recursively_resume(&child);
    }
}

/// Force the whole subtree back to `Inactive`.
pub fn recursively_deactivate(node: &StateRef) {
    let children = {
        let mut state = node.write();
        state.run.status = ExecutionStatus::Inactive;
        state.child_refs()
    };
    for child in children {
        recursively_deactivate(&child);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
