// SPDX-License-Identifier: MIT

//! Data-flows: parent-scoped edges carrying a value from a producer port
//! to a consumer port at the moment the producer completes.

use crate::id::StateId;
use serde::{Deserialize, Serialize};

/// Edge between two ports inside a container.
///
/// Endpoint states are direct children or the container itself (denoted by
/// the container's own state id); for the container, scoped variables and
/// its own ports share one id namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlow {
    pub data_flow_id: i64,
    pub from_state: StateId,
    pub from_port: i64,
    pub to_state: StateId,
    pub to_port: i64,
}

impl DataFlow {
    pub fn new(
        data_flow_id: i64,
        from_state: StateId,
        from_port: i64,
        to_state: StateId,
        to_port: i64,
    ) -> Self {
        Self { data_flow_id, from_state, from_port, to_state, to_port }
    }

    /// True if either endpoint is the port `(state, port_id)`.
    pub fn touches_port(&self, state: &StateId, port_id: i64) -> bool {
        (self.from_state == *state && self.from_port == port_id)
            || (self.to_state == *state && self.to_port == port_id)
    }

    /// True if either endpoint lies on `state`.
    pub fn touches_state(&self, state: &StateId) -> bool {
        self.from_state == *state || self.to_state == *state
    }
}
