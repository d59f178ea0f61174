// SPDX-License-Identifier: MIT

//! Structural errors of the data model.
//!
//! Every mutating operation validates first and applies second, so a
//! returned error means nothing changed.

use crate::value::DataType;
use thiserror::Error;

/// Kind of model element an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    State,
    InputPort,
    OutputPort,
    Outcome,
    Transition,
    DataFlow,
    ScopedVariable,
}

crate::simple_display! {
    ElementKind {
        State => "state",
        InputPort => "input port",
        OutputPort => "output port",
        Outcome => "outcome",
        Transition => "transition",
        DataFlow => "data flow",
        ScopedVariable => "scoped variable",
    }
}

/// Structural failure of a data-model operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: ElementKind, name: String },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: ElementKind, id: String },

    #[error("unknown {kind} reference {id}")]
    UnknownReference { kind: ElementKind, id: String },

    #[error("data type {from_type} is not assignable to {target}")]
    TypeMismatch { from_type: DataType, target: DataType },

    #[error("{kind} {id} is reserved and cannot be removed without force")]
    ReservedElement { kind: ElementKind, id: String },

    #[error("illegal name '{name}': {reason}")]
    IllegalName { name: String, reason: &'static str },

    #[error("concurrency state '{state}' has no decider child")]
    MissingDecider { state: String },

    #[error("state '{state}' is not a container")]
    NotAContainer { state: String },

    #[error("state '{state}' is not a {expected} state")]
    WrongVariant { state: String, expected: &'static str },
}

impl ModelError {
    pub(crate) fn unknown(kind: ElementKind, id: impl ToString) -> Self {
        Self::UnknownReference { kind, id: id.to_string() }
    }

    pub(crate) fn duplicate_name(kind: ElementKind, name: impl ToString) -> Self {
        Self::DuplicateName { kind, name: name.to_string() }
    }

    pub(crate) fn duplicate_id(kind: ElementKind, id: impl ToString) -> Self {
        Self::DuplicateId { kind, id: id.to_string() }
    }
}

/// Reject names containing the path separator.
pub(crate) fn check_name_legal(name: &str) -> Result<(), ModelError> {
    if name.is_empty() {
        return Err(ModelError::IllegalName { name: name.to_string(), reason: "empty" });
    }
    if name.contains(crate::path::PATH_SEPARATOR) {
        return Err(ModelError::IllegalName {
            name: name.to_string(),
            reason: "contains path separator",
        });
    }
    Ok(())
}
