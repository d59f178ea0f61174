// SPDX-License-Identifier: MIT

//! Container payload and the owner-side mutation operations.
//!
//! Containers own their children, transitions, data-flows and scoped
//! variables. Every operation validates against the container's current
//! contents before applying, so a failed call leaves the tree untouched.

use crate::data_flow::DataFlow;
use crate::error::{check_name_legal, ElementKind, ModelError};
use crate::event::{ChangeEvent, ChangeKind};
use crate::id::{generate_state_id, next_element_id, StateId};
use crate::outcome::{OUTCOME_ABORTED, OUTCOME_PREEMPTED};
use crate::port::PortDirection;
use crate::scoped::ScopedVariable;
use crate::state::{clear_links, propagate_links, State, StateKind, StateRef};
use crate::transition::Transition;
use crate::value::{DataType, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use smol_str::SmolStr;

/// Payload shared by hierarchy, barrier and preemptive states.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ContainerData {
    #[serde(default)]
    pub states: IndexMap<StateId, StateRef>,
    #[serde(default)]
    pub transitions: IndexMap<i64, Transition>,
    #[serde(default)]
    pub data_flows: IndexMap<i64, DataFlow>,
    #[serde(default)]
    pub scoped_variables: IndexMap<i64, ScopedVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_state_id: Option<StateId>,
    /// Barrier states only: the child that computes the final outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decider_id: Option<StateId>,
    /// Per-run values of the scoped variables, keyed by name.
    #[serde(skip)]
    pub scoped_data: IndexMap<SmolStr, Value>,
    /// Children executed in the current run, oldest first. Consumed by
    /// backward stepping; reset when the container starts a new run.
    #[serde(skip)]
    pub executed: Vec<ExecutedRecord>,
}

/// One completed child activation, with the scoped values from just
/// before it ran.
#[derive(Debug, Clone)]
pub struct ExecutedRecord {
    pub state_id: StateId,
    pub scoped_before: IndexMap<SmolStr, Value>,
}

impl ContainerData {
    /// Transition matching `(child, outcome)`, if any.
    pub fn find_transition(&self, from_state: &StateId, from_outcome: i64) -> Option<&Transition> {
        self.transitions.values().find(|t| t.matches_source(from_state, from_outcome))
    }

    /// Data-flow feeding `(child, input port)`, if any. At most one exists.
    pub fn flow_into(&self, to_state: &StateId, to_port: i64) -> Option<&DataFlow> {
        self.data_flows.values().find(|f| f.to_state == *to_state && f.to_port == to_port)
    }

    /// Data-flows whose producer is `(child, any port)`.
    pub fn flows_from(&self, from_state: &StateId) -> Vec<&DataFlow> {
        self.data_flows.values().filter(|f| f.from_state == *from_state).collect()
    }

    pub fn scoped_variable_by_name(&self, name: &str) -> Option<&ScopedVariable> {
        self.scoped_variables.values().find(|v| v.name == name)
    }

    pub(crate) fn remove_data_flows_touching(&mut self, state: &StateId, port_id: i64) -> Vec<DataFlow> {
        let ids: Vec<i64> = self
            .data_flows
            .values()
            .filter(|f| f.touches_port(state, port_id))
            .map(|f| f.data_flow_id)
            .collect();
        ids.iter().filter_map(|id| self.data_flows.shift_remove(id)).collect()
    }

    pub(crate) fn remove_data_flows_touching_state(&mut self, state: &StateId) -> Vec<DataFlow> {
        let ids: Vec<i64> = self
            .data_flows
            .values()
            .filter(|f| f.touches_state(state))
            .map(|f| f.data_flow_id)
            .collect();
        ids.iter().filter_map(|id| self.data_flows.shift_remove(id)).collect()
    }

    pub(crate) fn remove_transitions_from(&mut self, state: &StateId, outcome_id: i64) -> Vec<Transition> {
        let ids: Vec<i64> = self
            .transitions
            .values()
            .filter(|t| t.matches_source(state, outcome_id))
            .map(|t| t.transition_id)
            .collect();
        ids.iter().filter_map(|id| self.transitions.shift_remove(id)).collect()
    }

    pub(crate) fn remove_transitions_to_own_outcome(&mut self, outcome_id: i64) -> Vec<Transition> {
        let ids: Vec<i64> = self
            .transitions
            .values()
            .filter(|t| t.to_state.is_none() && t.to_outcome == Some(outcome_id))
            .map(|t| t.transition_id)
            .collect();
        ids.iter().filter_map(|id| self.transitions.shift_remove(id)).collect()
    }

    pub(crate) fn remove_transitions_touching_state(&mut self, state: &StateId) -> Vec<Transition> {
        let ids: Vec<i64> = self
            .transitions
            .values()
            .filter(|t| t.from_state.as_ref() == Some(state) || t.to_state.as_ref() == Some(state))
            .map(|t| t.transition_id)
            .collect();
        ids.iter().filter_map(|id| self.transitions.shift_remove(id)).collect()
    }

    /// Reset the per-run scoped values to the variable defaults.
    pub fn reset_scoped_data(&mut self) {
        self.scoped_data = self
            .scoped_variables
            .values()
            .map(|v| (v.name.clone(), v.default_value.clone().unwrap_or(Value::Null)))
            .collect();
    }

    pub(crate) fn deep_clone(&self) -> ContainerData {
        ContainerData {
            states: self
                .states
                .iter()
                .map(|(id, child)| (id.clone(), StateRef::new(child.read().deep_clone())))
                .collect(),
            transitions: self.transitions.clone(),
            data_flows: self.data_flows.clone(),
            scoped_variables: self.scoped_variables.clone(),
            start_state_id: self.start_state_id.clone(),
            decider_id: self.decider_id.clone(),
            scoped_data: IndexMap::new(),
            executed: Vec::new(),
        }
    }
}

/// Where a data-flow endpoint resolved to.
struct PortInfo {
    data_type: DataType,
    is_input: bool,
}

// -- observed container operations --

impl StateRef {
    /// Attach a detached state as a child. The child keeps its id unless it
    /// collides, in which case the call fails with `DuplicateId`.
    pub fn add_child(&self, child: State) -> Result<StateId, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (child_id, subject) = {
            let mut state = self.write();
            check_name_legal(child.state_id().as_str())?;
            let container = state.container_mut()?;
            let child_id = child.state_id().clone();
            if container.states.contains_key(&child_id) {
                return Err(ModelError::duplicate_id(ElementKind::State, &child_id));
            }
            container.states.insert(child_id.clone(), StateRef::new(child));
            (child_id, state.path().clone())
        };
        // Fix parent pointers, cached paths and hooks below the new child.
        propagate_links(self);
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "add_state")
                    .with_after(json!(child_id.as_str())),
            );
        }
        Ok(child_id)
    }

    /// Detach and destruct a child; transitions and data-flows referencing
    /// it are removed first, as are start/decider designations.
    pub fn remove_child(&self, child_id: &StateId) -> Result<StateRef, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (child, dropped, subject) = {
            let mut state = self.write();
            let container = state.container_mut()?;
            if !container.states.contains_key(child_id) {
                return Err(ModelError::unknown(ElementKind::State, child_id));
            }
            let dropped = container.remove_transitions_touching_state(child_id).len()
                + container.remove_data_flows_touching_state(child_id).len();
            if container.start_state_id.as_ref() == Some(child_id) {
                container.start_state_id = None;
            }
            if container.decider_id.as_ref() == Some(child_id) {
                container.decider_id = None;
            }
            let child = container
                .states
                .shift_remove(child_id)
                .ok_or_else(|| ModelError::unknown(ElementKind::State, child_id))?;
            (child, dropped, state.path().clone())
        };
        clear_links(&child);
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "remove_state")
                    .with_before(json!(child_id.as_str()))
                    .with_info(format!("removed {dropped} referencing element(s)")),
            );
        }
        Ok(child)
    }

    /// Add a transition. Either `(to_state, None)` continues with a
    /// sibling, or `(None, to_outcome)` ends the container on one of its
    /// own outcomes.
    pub fn add_transition(
        &self,
        from_state: Option<StateId>,
        from_outcome: Option<i64>,
        to_state: Option<StateId>,
        to_outcome: Option<i64>,
    ) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (transition_id, subject) = {
            let mut state = self.write();
            let id = add_transition_inner(&mut state, from_state, from_outcome, to_state, to_outcome)?;
            (id, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::Transition, "add_transition")
                    .with_after(json!(transition_id)),
            );
        }
        Ok(transition_id)
    }

    pub fn remove_transition(&self, transition_id: i64) -> Result<Transition, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (transition, subject) = {
            let mut state = self.write();
            let container = state.container_mut()?;
            let transition = container
                .transitions
                .shift_remove(&transition_id)
                .ok_or_else(|| ModelError::unknown(ElementKind::Transition, transition_id))?;
            (transition, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::Transition, "remove_transition")
                    .with_before(json!(transition_id)),
            );
        }
        Ok(transition)
    }

    /// Add a data-flow. Endpoints must resolve to ports of direct children
    /// or of the container itself (scoped variables included); types must
    /// be assignable and input ports accept at most one incoming flow.
    pub fn add_data_flow(
        &self,
        from_state: StateId,
        from_port: i64,
        to_state: StateId,
        to_port: i64,
    ) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (flow_id, subject) = {
            let mut state = self.write();
            let id = add_data_flow_inner(&mut state, from_state, from_port, to_state, to_port)?;
            (id, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::DataFlow, "add_data_flow")
                    .with_after(json!(flow_id)),
            );
        }
        Ok(flow_id)
    }

    pub fn remove_data_flow(&self, data_flow_id: i64) -> Result<DataFlow, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (flow, subject) = {
            let mut state = self.write();
            let container = state.container_mut()?;
            let flow = container
                .data_flows
                .shift_remove(&data_flow_id)
                .ok_or_else(|| ModelError::unknown(ElementKind::DataFlow, data_flow_id))?;
            (flow, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::DataFlow, "remove_data_flow")
                    .with_before(json!(data_flow_id)),
            );
        }
        Ok(flow)
    }

    /// Add a scoped variable; its id lives in the container's port
    /// namespace.
    pub fn add_scoped_variable(
        &self,
        name: &str,
        data_type: DataType,
        default: Option<Value>,
    ) -> Result<i64, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (port_id, subject) = {
            let mut state = self.write();
            check_name_legal(name)?;
            let free_id = next_element_id(state.all_port_ids());
            let container = state.container_mut()?;
            if container.scoped_variables.values().any(|v| v.name == name) {
                return Err(ModelError::duplicate_name(ElementKind::ScopedVariable, name));
            }
            if let Some(value) = &default {
                if !data_type.accepts_value(value) {
                    return Err(ModelError::TypeMismatch {
                        from_type: DataType::of_value(value),
                        target: data_type,
                    });
                }
            }
            let mut variable = ScopedVariable::new(free_id, name, data_type);
            variable.default_value = default;
            container.scoped_variables.insert(free_id, variable);
            (free_id, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::ScopedVariable, "add_scoped_variable")
                    .with_after(json!({ "port_id": port_id, "name": name })),
            );
        }
        Ok(port_id)
    }

    /// Remove a scoped variable; data-flows touching it go first.
    pub fn remove_scoped_variable(&self, port_id: i64) -> Result<ScopedVariable, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (variable, dropped, subject) = {
            let mut state = self.write();
            let self_id = state.state_id().clone();
            let container = state.container_mut()?;
            if !container.scoped_variables.contains_key(&port_id) {
                return Err(ModelError::unknown(ElementKind::ScopedVariable, port_id));
            }
            let dropped = container.remove_data_flows_touching(&self_id, port_id).len();
            let variable = container
                .scoped_variables
                .shift_remove(&port_id)
                .ok_or_else(|| ModelError::unknown(ElementKind::ScopedVariable, port_id))?;
            (variable, dropped, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::ScopedVariable, "remove_scoped_variable")
                    .with_before(json!({ "port_id": port_id, "name": variable.name.as_str() }))
                    .with_info(format!("removed {dropped} data flow(s)")),
            );
        }
        Ok(variable)
    }

    /// Designate the start child (`None` clears it).
    pub fn set_start_state(&self, start: Option<StateId>) -> Result<(), ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (before, subject) = {
            let mut state = self.write();
            let container = state.container_mut()?;
            if let Some(id) = &start {
                if !container.states.contains_key(id) {
                    return Err(ModelError::unknown(ElementKind::State, id));
                }
            }
            let before = std::mem::replace(&mut container.start_state_id, start.clone());
            (before, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "start_state")
                    .with_before(json!(before.as_ref().map(StateId::as_str)))
                    .with_after(json!(start.as_ref().map(StateId::as_str))),
            );
        }
        Ok(())
    }

    /// Designate the decider child of a barrier state.
    pub fn set_decider(&self, decider: Option<StateId>) -> Result<(), ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (before, subject) = {
            let mut state = self.write();
            if !matches!(state.kind(), StateKind::Barrier(_)) {
                return Err(ModelError::WrongVariant {
                    state: state.name().to_string(),
                    expected: "barrier",
                });
            }
            let container = state.container_mut()?;
            if let Some(id) = &decider {
                if !container.states.contains_key(id) {
                    return Err(ModelError::unknown(ElementKind::State, id));
                }
            }
            let before = std::mem::replace(&mut container.decider_id, decider.clone());
            (before, state.path().clone())
        };
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "decider")
                    .with_before(json!(before.as_ref().map(StateId::as_str)))
                    .with_after(json!(decider.as_ref().map(StateId::as_str))),
            );
        }
        Ok(())
    }

    /// Re-key a child under a new id (generated when `None`), rewiring
    /// transitions, data-flows and designations.
    pub fn change_state_id(
        &self,
        old_id: &StateId,
        new_id: Option<StateId>,
    ) -> Result<StateId, ModelError> {
        let hooks = self.hooks();
        let _guard = hooks.as_ref().map(|h| h.structural.lock());
        let (new_id, subject) = {
            let mut state = self.write();
            let container = state.container_mut()?;
            if !container.states.contains_key(old_id) {
                return Err(ModelError::unknown(ElementKind::State, old_id));
            }
            let new_id = match new_id {
                Some(id) => {
                    check_name_legal(id.as_str())?;
                    if container.states.contains_key(&id) {
                        return Err(ModelError::duplicate_id(ElementKind::State, &id));
                    }
                    id
                }
                None => generate_state_id(&container.states.keys().cloned().collect()),
            };
            let child = container
                .states
                .shift_remove(old_id)
                .ok_or_else(|| ModelError::unknown(ElementKind::State, old_id))?;
            child.write().set_state_id(new_id.clone());
            container.states.insert(new_id.clone(), child);
            for transition in container.transitions.values_mut() {
                if transition.from_state.as_ref() == Some(old_id) {
                    transition.from_state = Some(new_id.clone());
                }
                if transition.to_state.as_ref() == Some(old_id) {
                    transition.to_state = Some(new_id.clone());
                }
            }
            for flow in container.data_flows.values_mut() {
                if flow.from_state == *old_id {
                    flow.from_state = new_id.clone();
                }
                if flow.to_state == *old_id {
                    flow.to_state = new_id.clone();
                }
            }
            if container.start_state_id.as_ref() == Some(old_id) {
                container.start_state_id = Some(new_id.clone());
            }
            if container.decider_id.as_ref() == Some(old_id) {
                container.decider_id = Some(new_id.clone());
            }
            (new_id, state.path().clone())
        };
        // Cached paths below the renamed child changed.
        propagate_links(self);
        if let Some(h) = &hooks {
            h.bus.emit(
                ChangeEvent::new(subject, ChangeKind::State, "change_state_id")
                    .with_before(json!(old_id.as_str()))
                    .with_after(json!(new_id.as_str())),
            );
        }
        Ok(new_id)
    }
}

fn add_transition_inner(
    state: &mut State,
    from_state: Option<StateId>,
    from_outcome: Option<i64>,
    to_state: Option<StateId>,
    to_outcome: Option<i64>,
) -> Result<i64, ModelError> {
    let container = state.container()?;

    // Source: a child outcome, or the container start when absent.
    if let Some(from) = &from_state {
        let child = container
            .states
            .get(from)
            .ok_or_else(|| ModelError::unknown(ElementKind::State, from))?;
        let outcome =
            from_outcome.ok_or_else(|| ModelError::unknown(ElementKind::Outcome, "none"))?;
        if !child.read().outcomes().contains_key(&outcome) {
            return Err(ModelError::unknown(ElementKind::Outcome, outcome));
        }
        if container.find_transition(from, outcome).is_some() {
            return Err(ModelError::duplicate_id(
                ElementKind::Transition,
                format!("{from}:{outcome}"),
            ));
        }
    }

    // Target: a sibling, or one of the container's own outcomes.
    match (&to_state, to_outcome) {
        (Some(to), None) => {
            if !container.states.contains_key(to) {
                return Err(ModelError::unknown(ElementKind::State, to));
            }
        }
        (None, Some(outcome)) => {
            if !state.outcomes().contains_key(&outcome) {
                return Err(ModelError::unknown(ElementKind::Outcome, outcome));
            }
        }
        _ => {
            return Err(ModelError::unknown(ElementKind::Transition, "target"));
        }
    }

    let container = state.container_mut()?;
    let transition_id = next_element_id(container.transitions.keys().copied());
    container.transitions.insert(
        transition_id,
        Transition { transition_id, from_state, from_outcome, to_state, to_outcome },
    );
    Ok(transition_id)
}

fn add_data_flow_inner(
    state: &mut State,
    from_state: StateId,
    from_port: i64,
    to_state: StateId,
    to_port: i64,
) -> Result<i64, ModelError> {
    let source = resolve_port(state, &from_state, from_port, PortDirection::Output)?;
    let target = resolve_port(state, &to_state, to_port, PortDirection::Input)?;
    if !target.data_type.is_assignable_from(source.data_type) {
        return Err(ModelError::TypeMismatch { from_type: source.data_type, target: target.data_type });
    }
    let container = state.container()?;
    if target.is_input && container.flow_into(&to_state, to_port).is_some() {
        return Err(ModelError::duplicate_id(
            ElementKind::DataFlow,
            format!("{to_state}:{to_port}"),
        ));
    }
    let container = state.container_mut()?;
    let data_flow_id = next_element_id(container.data_flows.keys().copied());
    container
        .data_flows
        .insert(data_flow_id, DataFlow::new(data_flow_id, from_state, from_port, to_state, to_port));
    Ok(data_flow_id)
}

/// Resolve a data-flow endpoint. For the container itself the port may be
/// an own port (input side feeds children, output side collects from them)
/// or a scoped variable, which is legal on both ends.
fn resolve_port(
    state: &State,
    endpoint: &StateId,
    port_id: i64,
    wanted: PortDirection,
) -> Result<PortInfo, ModelError> {
    let container = state.container()?;
    if endpoint == state.state_id() {
        if let Some(variable) = container.scoped_variables.get(&port_id) {
            return Ok(PortInfo { data_type: variable.data_type, is_input: false });
        }
        // On the container, the roles flip: its input ports are producers
        // for the children, its output ports are consumers.
        let port = match wanted {
            PortDirection::Output => state.input_ports().get(&port_id),
            PortDirection::Input => state.output_ports().get(&port_id),
        };
        let port = port.ok_or_else(|| {
            ModelError::unknown(element_kind_for(wanted), format!("{endpoint}:{port_id}"))
        })?;
        return Ok(PortInfo { data_type: port.data_type, is_input: false });
    }
    let child = container
        .states
        .get(endpoint)
        .ok_or_else(|| ModelError::unknown(ElementKind::State, endpoint))?;
    let child = child.read();
    let port = match wanted {
        PortDirection::Output => child.output_ports().get(&port_id),
        PortDirection::Input => child.input_ports().get(&port_id),
    };
    let port = port.ok_or_else(|| {
        ModelError::unknown(element_kind_for(wanted), format!("{endpoint}:{port_id}"))
    })?;
    Ok(PortInfo { data_type: port.data_type, is_input: wanted == PortDirection::Input })
}

fn element_kind_for(direction: PortDirection) -> ElementKind {
    match direction {
        PortDirection::Input => ElementKind::InputPort,
        PortDirection::Output => ElementKind::OutputPort,
    }
}

/// Recursive invariant check used on attach and by the machine wrapper.
pub(crate) fn validate_state(state: &State) -> Result<(), ModelError> {
    if !state.outcomes().contains_key(&OUTCOME_ABORTED)
        || !state.outcomes().contains_key(&OUTCOME_PREEMPTED)
    {
        return Err(ModelError::unknown(ElementKind::Outcome, "reserved outcomes"));
    }
    match state.kind() {
        StateKind::Execution(_) => Ok(()),
        StateKind::Library(lib) => validate_state(&lib.inner.read()),
        StateKind::Hierarchy(container) => {
            validate_container(state, container)?;
            match &container.start_state_id {
                Some(start) if !container.states.contains_key(start) => {
                    Err(ModelError::unknown(ElementKind::State, start))
                }
                None if !container.states.is_empty() => {
                    Err(ModelError::unknown(ElementKind::State, "start state"))
                }
                _ => Ok(()),
            }
        }
        StateKind::Barrier(container) => {
            validate_container(state, container)?;
            match &container.decider_id {
                Some(decider) if container.states.contains_key(decider) => Ok(()),
                _ => Err(ModelError::MissingDecider { state: state.name().to_string() }),
            }
        }
        StateKind::Preemptive(container) => validate_container(state, container),
    }
}

fn validate_container(state: &State, container: &ContainerData) -> Result<(), ModelError> {
    for transition in container.transitions.values() {
        if let Some(from) = &transition.from_state {
            let child = container
                .states
                .get(from)
                .ok_or_else(|| ModelError::unknown(ElementKind::State, from))?;
            let from_outcome = transition
                .from_outcome
                .ok_or_else(|| ModelError::unknown(ElementKind::Outcome, "none"))?;
            if !child.read().outcomes().contains_key(&from_outcome) {
                return Err(ModelError::unknown(ElementKind::Outcome, from_outcome));
            }
        }
        match (&transition.to_state, transition.to_outcome) {
            (Some(to), _) if !container.states.contains_key(to) => {
                return Err(ModelError::unknown(ElementKind::State, to));
            }
            (None, Some(outcome)) if !state.outcomes().contains_key(&outcome) => {
                return Err(ModelError::unknown(ElementKind::Outcome, outcome));
            }
            (None, None) => {
                return Err(ModelError::unknown(ElementKind::Transition, "target"));
            }
            _ => {}
        }
    }
    for flow in container.data_flows.values() {
        resolve_port(state, &flow.from_state, flow.from_port, PortDirection::Output)?;
        resolve_port(state, &flow.to_state, flow.to_port, PortDirection::Input)?;
    }
    for child in container.states.values() {
        validate_state(&child.read())?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
