// SPDX-License-Identifier: MIT

//! Scoped variables: container-local values visible to direct children
//! through data-flows.

use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Port-shaped value owned by a container. Its id lives in the same
/// namespace as the container's own ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedVariable {
    pub port_id: i64,
    pub name: SmolStr,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ScopedVariable {
    pub fn new(port_id: i64, name: impl Into<SmolStr>, data_type: DataType) -> Self {
        Self { port_id, name: name.into(), data_type, default_value: None }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}
