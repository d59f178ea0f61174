// SPDX-License-Identifier: MIT

//! Outcomes: named, numbered exit points of a state.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Reserved outcome id: the state's body raised or no transition matched.
pub const OUTCOME_ABORTED: i64 = -1;

/// Reserved outcome id: the state was cooperatively cancelled.
pub const OUTCOME_PREEMPTED: i64 = -2;

/// Exit point of a state. Every state carries the two reserved outcomes
/// [`OUTCOME_ABORTED`] and [`OUTCOME_PREEMPTED`] at all times.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_id: i64,
    pub name: SmolStr,
}

impl Outcome {
    pub fn new(outcome_id: i64, name: impl Into<SmolStr>) -> Self {
        Self { outcome_id, name: name.into() }
    }

    pub fn aborted() -> Self {
        Self::new(OUTCOME_ABORTED, "aborted")
    }

    pub fn preempted() -> Self {
        Self::new(OUTCOME_PREEMPTED, "preempted")
    }

    pub fn is_reserved(&self) -> bool {
        is_reserved_outcome(self.outcome_id)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.outcome_id)
    }
}

/// True for the ids every state must keep.
pub fn is_reserved_outcome(outcome_id: i64) -> bool {
    outcome_id == OUTCOME_ABORTED || outcome_id == OUTCOME_PREEMPTED
}
