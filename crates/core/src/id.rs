// SPDX-License-Identifier: MIT

//! Identifier service.
//!
//! State identifiers are short random uppercase strings, unique within
//! their parent; numeric element ids (ports, outcomes, transitions,
//! data-flows) are allocated as the smallest free non-negative integer so
//! the reserved negative outcome ids can never collide with generated
//! ones. Run ids are UUIDs, fresh per state activation.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashSet;

/// Length of a generated state id.
pub const STATE_ID_LEN: usize = 6;

const STATE_ID_ALPHABET: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Identifier of a state, unique within its parent container.
///
/// Generated ids are [`STATE_ID_LEN`] uppercase letters; explicit ids from
/// callers may be any non-empty string without the path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(SmolStr);

impl StateId {
    /// Create an id from an existing string. No uniqueness check; name
    /// legality is enforced by the attach/mutation operations.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StateId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for StateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StateId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StateId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Generate a fresh state id, retrying until it misses the taken set.
pub fn generate_state_id(taken: &HashSet<StateId>) -> StateId {
    loop {
        let id = StateId::new(nanoid::nanoid!(STATE_ID_LEN, &STATE_ID_ALPHABET));
        if !taken.contains(&id) {
            return id;
        }
    }
}

/// Smallest non-negative integer missing from `taken`.
///
/// Reserved element ids are negative, so generated ids never shadow them.
pub fn next_element_id<I>(taken: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    let taken: HashSet<i64> = taken.into_iter().collect();
    (0..).find(|id| !taken.contains(id)).unwrap_or(i64::MAX)
}

/// Identifier of one state activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(SmolStr);

impl RunId {
    /// Fresh run id for a new activation.
    pub fn generate() -> Self {
        Self(SmolStr::new(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
