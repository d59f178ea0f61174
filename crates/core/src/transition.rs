// SPDX-License-Identifier: MIT

//! Transitions: parent-scoped edges from a child outcome to a sibling or a
//! container outcome.

use crate::id::StateId;
use serde::{Deserialize, Serialize};

/// Edge in a container.
///
/// `from_state: None` marks a start transition (the container start takes
/// its place). `to_state: None` targets the container itself, in which
/// case `to_outcome` names the container outcome; otherwise `to_state`
/// names the sibling to continue with and `to_outcome` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub transition_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<StateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_outcome: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_state: Option<StateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_outcome: Option<i64>,
}

impl Transition {
    /// Edge from a child outcome to a sibling.
    pub fn to_sibling(
        transition_id: i64,
        from_state: StateId,
        from_outcome: i64,
        to_state: StateId,
    ) -> Self {
        Self {
            transition_id,
            from_state: Some(from_state),
            from_outcome: Some(from_outcome),
            to_state: Some(to_state),
            to_outcome: None,
        }
    }

    /// Edge from a child outcome to an outcome of the container itself.
    pub fn to_parent_outcome(
        transition_id: i64,
        from_state: StateId,
        from_outcome: i64,
        to_outcome: i64,
    ) -> Self {
        Self {
            transition_id,
            from_state: Some(from_state),
            from_outcome: Some(from_outcome),
            to_state: None,
            to_outcome: Some(to_outcome),
        }
    }

    /// True if this edge originates at `(state, outcome)`.
    pub fn matches_source(&self, state: &StateId, outcome: i64) -> bool {
        self.from_state.as_ref() == Some(state) && self.from_outcome == Some(outcome)
    }
}
