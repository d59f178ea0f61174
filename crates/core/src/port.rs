// SPDX-License-Identifier: MIT

//! Data ports.

use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Direction of a data port relative to its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

crate::simple_display! {
    PortDirection {
        Input => "input",
        Output => "output",
    }
}

/// Typed input or output port of a state.
///
/// Names are unique per direction within a state; ids are unique across
/// both directions (scoped variables share the container's id namespace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPort {
    pub port_id: i64,
    pub name: SmolStr,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl DataPort {
    pub fn new(port_id: i64, name: impl Into<SmolStr>, data_type: DataType) -> Self {
        Self { port_id, name: name.into(), data_type, default_value: None }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}
