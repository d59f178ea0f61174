// SPDX-License-Identifier: MIT

//! Control modes of the execution engine.

use serde::{Deserialize, Serialize};

/// Control state of the driver.
///
/// `Created -> Started <-> Paused <-> ForwardInto / ForwardOver /
/// ForwardOut / Backward -> Stopped -> Finished`. The stepping modes are
/// single-shot: they advance one state unit and fall back to `Paused`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Created,
    Started,
    Paused,
    ForwardInto,
    ForwardOver,
    ForwardOut,
    Backward,
    Stopped,
    Finished,
}

machina_core::simple_display! {
    ExecutionMode {
        Created => "created",
        Started => "started",
        Paused => "paused",
        ForwardInto => "forward_into",
        ForwardOver => "forward_over",
        ForwardOut => "forward_out",
        Backward => "backward",
        Stopped => "stopped",
        Finished => "finished",
    }
}

impl ExecutionMode {
    /// True while a run exists, finished or not.
    pub fn is_active(self) -> bool {
        !matches!(self, ExecutionMode::Created | ExecutionMode::Stopped | ExecutionMode::Finished)
    }

    pub fn is_stepping(self) -> bool {
        matches!(
            self,
            ExecutionMode::ForwardInto
                | ExecutionMode::ForwardOver
                | ExecutionMode::ForwardOut
                | ExecutionMode::Backward
        )
    }

    /// Modes a fresh `start` is legal from.
    pub fn can_start(self) -> bool {
        matches!(self, ExecutionMode::Created | ExecutionMode::Stopped | ExecutionMode::Finished)
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
