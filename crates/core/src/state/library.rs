// SPDX-License-Identifier: MIT

//! Library reference states and the template registry.
//!
//! A library state wraps a pre-instantiated copy of a named state tree.
//! Its own ports and outcomes mirror the inner root, so transitions and
//! data-flows attach to the library state like to any other child; input
//! ports can be overridden per instance with runtime values.

use crate::error::{ElementKind, ModelError};
use crate::state::{State, StateKind, StateRef};
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashMap;

/// Payload of a library reference state.
#[derive(Debug, Serialize, Deserialize)]
pub struct LibraryData {
    pub library_name: SmolStr,
    /// Owned instantiated copy of the library tree.
    pub inner: StateRef,
    /// Input port id -> use the runtime value instead of the default.
    #[serde(default)]
    pub use_runtime_value: IndexMap<i64, bool>,
    /// Input port id -> per-instance override value.
    #[serde(default)]
    pub runtime_values: IndexMap<i64, Value>,
}

impl LibraryData {
    pub(crate) fn deep_clone(&self) -> LibraryData {
        LibraryData {
            library_name: self.library_name.clone(),
            inner: StateRef::new(self.inner.read().deep_clone()),
            use_runtime_value: self.use_runtime_value.clone(),
            runtime_values: self.runtime_values.clone(),
        }
    }
}

impl State {
    /// Wrap `inner` as a library reference. Ports and outcomes of the
    /// wrapper mirror the inner root, ids included.
    pub fn library(name: &str, library_name: &str, inner: State) -> State {
        let input_ports = inner.input_ports().clone();
        let output_ports = inner.output_ports().clone();
        let outcomes = inner.outcomes().clone();
        let mut state = State::new(
            name,
            StateKind::Library(LibraryData {
                library_name: SmolStr::new(library_name),
                inner: StateRef::new(inner),
                use_runtime_value: IndexMap::new(),
                runtime_values: IndexMap::new(),
            }),
        );
        state.input_ports = input_ports;
        state.output_ports = output_ports;
        state.outcomes = outcomes;
        state
    }

    /// Toggle the runtime override of a library input port.
    pub fn set_use_runtime_value(&mut self, port_id: i64, enabled: bool) -> Result<(), ModelError> {
        if !self.input_ports.contains_key(&port_id) {
            return Err(ModelError::unknown(ElementKind::InputPort, port_id));
        }
        match &mut self.kind {
            StateKind::Library(lib) => {
                lib.use_runtime_value.insert(port_id, enabled);
                Ok(())
            }
            _ => Err(ModelError::WrongVariant { state: self.name.to_string(), expected: "library" }),
        }
    }

    /// Set the runtime override value of a library input port.
    pub fn set_runtime_value(&mut self, port_id: i64, value: Value) -> Result<(), ModelError> {
        if !self.input_ports.contains_key(&port_id) {
            return Err(ModelError::unknown(ElementKind::InputPort, port_id));
        }
        match &mut self.kind {
            StateKind::Library(lib) => {
                lib.runtime_values.insert(port_id, value);
                Ok(())
            }
            _ => Err(ModelError::WrongVariant { state: self.name.to_string(), expected: "library" }),
        }
    }
}

/// Registry of named library templates.
///
/// The loader that fills it from `MACHINA_LIB_PATH` lives outside the
/// core; this is only the interface it and the instantiation code share.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    templates: RwLock<HashMap<SmolStr, StateRef>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, library_name: &str, template: State) {
        self.templates.write().insert(SmolStr::new(library_name), StateRef::new(template));
    }

    pub fn contains(&self, library_name: &str) -> bool {
        self.templates.read().contains_key(library_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.read().keys().map(|k| k.to_string()).collect()
    }

    /// Deep-copy a template into a fresh library state named `as_name`.
    pub fn instantiate(&self, library_name: &str, as_name: &str) -> Option<State> {
        let template = self.templates.read().get(library_name)?.clone();
        let copy = template.read().deep_clone();
        Some(State::library(as_name, library_name, copy))
    }
}
