// SPDX-License-Identifier: MIT

//! Execution history recorder.
//!
//! Appended by the runner at every state entry and exit; read by the
//! history/editor collaborators and by backward stepping diagnostics.

use machina_core::{RunId, StatePath};
use parking_lot::Mutex;
use serde::Serialize;
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryItemKind {
    /// A state was entered.
    Call,
    /// A state finished with an outcome (`None` for backward runs).
    Return,
    /// A state was re-entered backwards.
    BackwardCall,
}

machina_core::simple_display! {
    HistoryItemKind {
        Call => "call",
        Return => "return",
        BackwardCall => "backward_call",
    }
}

/// One recorded execution step.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub kind: HistoryItemKind,
    pub path: StatePath,
    pub state_name: SmolStr,
    pub run_id: Option<RunId>,
    pub outcome: Option<i64>,
    pub at_ms: u64,
}

/// Append-only record of one engine run.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    items: Mutex<Vec<HistoryItem>>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, item: HistoryItem) {
        self.items.lock().push(item);
    }

    pub fn snapshot(&self) -> Vec<HistoryItem> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn last(&self) -> Option<HistoryItem> {
        self.items.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
