// SPDX-License-Identifier: MIT

//! `/`-joined state paths.

use crate::id::StateId;
use serde::{Deserialize, Serialize};

/// Separator between state ids in a path. State names and ids may not
/// contain it.
pub const PATH_SEPARATOR: char = '/';

/// Absolute path of a state: the state ids from the root down, joined by
/// [`PATH_SEPARATOR`]. The empty path denotes "no position" (a detached
/// state).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatePath(Vec<StateId>);

impl StatePath {
    pub fn root(id: StateId) -> Self {
        Self(vec![id])
    }

    /// Parse a `/`-joined path. Empty input yields the empty path; empty
    /// segments are rejected.
    pub fn parse(input: &str) -> Option<Self> {
        if input.is_empty() {
            return Some(Self::default());
        }
        let mut segments = Vec::new();
        for part in input.split(PATH_SEPARATOR) {
            if part.is_empty() {
                return None;
            }
            segments.push(StateId::new(part));
        }
        Some(Self(segments))
    }

    /// Path of a child of `self`.
    pub fn join(&self, id: StateId) -> Self {
        let mut segments = self.0.clone();
        segments.push(id);
        Self(segments)
    }

    /// Path of the parent, or `None` for the root and the empty path.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Final segment.
    pub fn leaf(&self) -> Option<&StateId> {
        self.0.last()
    }

    /// Number of segments; the root state has depth 1.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `prefix` is an ancestor-or-self prefix of this path.
    pub fn starts_with(&self, prefix: &StatePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Segment at `index`, root first.
    pub fn segment(&self, index: usize) -> Option<&StateId> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateId> {
        self.0.iter()
    }
}

impl std::fmt::Display for StatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(id.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for StatePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StatePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        StatePath::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid state path {raw:?}")))
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
