// SPDX-License-Identifier: MIT

//! Data types carried by ports, outcomes of the JSON value model.

use serde::{Deserialize, Serialize};

/// Runtime value flowing through ports, scoped variables and globals.
pub type Value = serde_json::Value;

/// Declared type of a port, scoped variable or global variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Accepts any value.
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Dict,
}

crate::simple_display! {
    DataType {
        Any => "any",
        Bool => "bool",
        Int => "int",
        Float => "float",
        Str => "str",
        List => "list",
        Dict => "dict",
    }
}

impl DataType {
    /// Assignability for data-flow endpoints: `Any` on either side accepts,
    /// `Float` accepts `Int`, everything else must match exactly.
    pub fn is_assignable_from(self, source: DataType) -> bool {
        match (self, source) {
            (DataType::Any, _) | (_, DataType::Any) => true,
            (DataType::Float, DataType::Int) => true,
            (a, b) => a == b,
        }
    }

    /// True if `value` inhabits this type. `null` stands for an absent
    /// value and matches every type.
    pub fn accepts_value(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            DataType::Any => true,
            DataType::Bool => value.is_boolean(),
            DataType::Int => value.is_i64() || value.is_u64(),
            DataType::Float => value.is_number(),
            DataType::Str => value.is_string(),
            DataType::List => value.is_array(),
            DataType::Dict => value.is_object(),
        }
    }

    /// Most specific type of a concrete value; `null` maps to `Any`.
    pub fn of_value(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Any,
            Value::Bool(_) => DataType::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => DataType::Int,
            Value::Number(_) => DataType::Float,
            Value::String(_) => DataType::Str,
            Value::Array(_) => DataType::List,
            Value::Object(_) => DataType::Dict,
        }
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
