// SPDX-License-Identifier: MIT

//! Value routing along data-flows.
//!
//! Inputs are pulled when a child starts: each connected input port takes
//! the value from its upstream producer (sibling output, container input,
//! or scoped variable); unconnected ports fall back to their default,
//! where a string default beginning with `$` resolves through the global
//! variable store. Outputs are pushed when the producer completes.

use crate::context::ExecutionContext;
use machina_core::{
    Clock, ContainerData, DataFlow, DataPort, State, StateRef, Value,
};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Fill a child's `input_data` from its parent's data-flows and defaults.
pub(crate) fn populate_child_inputs<C: Clock>(
    parent: &StateRef,
    child: &StateRef,
    ctx: &ExecutionContext<C>,
) {
    let values = {
        let p = parent.read();
        let c = child.read();
        let Some(container) = p.kind().container() else {
            return;
        };
        let child_id = c.state_id().clone();
        let mut map = IndexMap::new();
        for port in c.input_ports().values() {
            let value = match container.flow_into(&child_id, port.port_id) {
                Some(flow) if flow.from_state == child_id => {
                    // Self-loop: read from the child's own previous outputs.
                    own_output(&c, flow)
                }
                Some(flow) => source_value(&p, container, flow),
                None => resolve_default(&c, port, ctx),
            };
            map.insert(port.name.clone(), value);
        }
        map
    };
    child.write().run.input_data = values;
}

fn own_output(child: &State, flow: &DataFlow) -> Value {
    let Some(port) = child.output_ports().get(&flow.from_port) else {
        return Value::Null;
    };
    child.run.output_data.get(port.name.as_str()).cloned().unwrap_or(Value::Null)
}

fn source_value(parent: &State, container: &ContainerData, flow: &DataFlow) -> Value {
    if flow.from_state == *parent.state_id() {
        if let Some(variable) = container.scoped_variables.get(&flow.from_port) {
            return container
                .scoped_data
                .get(variable.name.as_str())
                .cloned()
                .unwrap_or(Value::Null);
        }
        if let Some(port) = parent.input_ports().get(&flow.from_port) {
            return parent.run.input_data.get(port.name.as_str()).cloned().unwrap_or(Value::Null);
        }
        return Value::Null;
    }
    let Some(sibling) = container.states.get(&flow.from_state) else {
        return Value::Null;
    };
    let sibling = sibling.read();
    let Some(port) = sibling.output_ports().get(&flow.from_port) else {
        return Value::Null;
    };
    sibling.run.output_data.get(port.name.as_str()).cloned().unwrap_or(Value::Null)
}

/// Default for an unconnected input port: library runtime overrides apply
/// first, then `$name` strings resolve through the global store (a missing
/// global logs and yields null).
pub(crate) fn resolve_default<C: Clock>(
    state: &State,
    port: &DataPort,
    ctx: &ExecutionContext<C>,
) -> Value {
    let raw = state.default_input(port);
    if let Value::String(text) = &raw {
        if let Some(name) = text.strip_prefix('$') {
            return match ctx.globals.get(name) {
                Some(value) => value,
                None => {
                    tracing::error!(variable = name, "global variable does not exist");
                    Value::Null
                }
            };
        }
    }
    raw
}

/// Seed a root state's inputs from its own port defaults.
pub(crate) fn seed_root_inputs<C: Clock>(state: &StateRef, ctx: &ExecutionContext<C>) {
    let values: Vec<(SmolStr, Value)> = {
        let s = state.read();
        s.input_ports()
            .values()
            .filter(|port| !s.run.input_data.contains_key(port.name.as_str()))
            .map(|port| (port.name.clone(), resolve_default(&s, port, ctx)))
            .collect()
    };
    if values.is_empty() {
        return;
    }
    let mut s = state.write();
    for (name, value) in values {
        s.run.input_data.insert(name, value);
    }
}

/// Reset a container's scoped values to their defaults and apply the
/// flows feeding scoped variables from the container's own inputs.
pub(crate) fn init_scoped(parent: &StateRef) {
    let mut p = parent.write();
    let parent_id = p.state_id().clone();
    {
        let Some(container) = p.kind_mut().container_mut() else {
            return;
        };
        container.reset_scoped_data();
        container.executed.clear();
    }
    let updates: Vec<(SmolStr, Value)> = {
        let Some(container) = p.kind().container() else {
            return;
        };
        container
            .data_flows
            .values()
            .filter(|f| f.from_state == parent_id && f.to_state == parent_id)
            .filter_map(|f| {
                let variable = container.scoped_variables.get(&f.to_port)?;
                let port = p.input_ports().get(&f.from_port)?;
                let value =
                    p.run.input_data.get(port.name.as_str()).cloned().unwrap_or(Value::Null);
                Some((variable.name.clone(), value))
            })
            .collect()
    };
    if let Some(container) = p.kind_mut().container_mut() {
        for (name, value) in updates {
            container.scoped_data.insert(name, value);
        }
    }
}

/// Push a completed child's outputs into scoped variables and container
/// output ports. Sibling inputs pull their values when they start.
pub(crate) fn propagate_child_outputs(parent: &StateRef, child: &StateRef) {
    let (child_id, child_ports, child_outputs) = {
        let c = child.read();
        (c.state_id().clone(), c.output_ports().clone(), c.run.output_data.clone())
    };
    let mut p = parent.write();
    let parent_id = p.state_id().clone();
    let (scoped_updates, output_updates): (Vec<(SmolStr, Value)>, Vec<(SmolStr, Value)>) = {
        let Some(container) = p.kind().container() else {
            return;
        };
        let mut scoped = Vec::new();
        let mut outputs = Vec::new();
        for flow in container.data_flows.values().filter(|f| f.from_state == child_id) {
            if flow.to_state != parent_id {
                continue;
            }
            let Some(port) = child_ports.get(&flow.from_port) else {
                continue;
            };
            let value = child_outputs.get(port.name.as_str()).cloned().unwrap_or(Value::Null);
            if let Some(variable) = container.scoped_variables.get(&flow.to_port) {
                scoped.push((variable.name.clone(), value));
            } else if let Some(out) = p.output_ports().get(&flow.to_port) {
                outputs.push((out.name.clone(), value));
            }
        }
        (scoped, outputs)
    };
    if let Some(container) = p.kind_mut().container_mut() {
        for (name, value) in scoped_updates {
            container.scoped_data.insert(name, value);
        }
    }
    for (name, value) in output_updates {
        p.run.output_data.insert(name, value);
    }
}

/// Apply the container's internal flows (inputs and scoped variables into
/// its own output ports) when the container finishes.
pub(crate) fn collect_container_outputs(parent: &StateRef) {
    let mut p = parent.write();
    let parent_id = p.state_id().clone();
    let updates: Vec<(SmolStr, Value)> = {
        let Some(container) = p.kind().container() else {
            return;
        };
        container
            .data_flows
            .values()
            .filter(|f| f.from_state == parent_id && f.to_state == parent_id)
            .filter_map(|f| {
                let out = p.output_ports().get(&f.to_port)?;
                let value = if let Some(variable) = container.scoped_variables.get(&f.from_port) {
                    container.scoped_data.get(variable.name.as_str()).cloned().unwrap_or(Value::Null)
                } else if let Some(input) = p.input_ports().get(&f.from_port) {
                    p.run.input_data.get(input.name.as_str()).cloned().unwrap_or(Value::Null)
                } else {
                    return None;
                };
                Some((out.name.clone(), value))
            })
            .collect()
    };
    for (name, value) in updates {
        p.run.output_data.insert(name, value);
    }
}
