// SPDX-License-Identifier: MIT

//! Machine loading hook.
//!
//! Reads the serde form of a state tree from a file (or `machine.json`
//! inside a directory). The on-disk layout belongs to the persistence
//! collaborator; this hook only feeds the engine. Leaf bodies deserialize
//! as no-ops and are rebound by whatever registered them.

use anyhow::Context;
use machina_core::StateMachine;
use std::path::Path;
use std::sync::Arc;

const MACHINE_FILE: &str = "machine.json";

pub fn open_machine(path: &Path) -> anyhow::Result<Arc<StateMachine>> {
    let file = if path.is_dir() { path.join(MACHINE_FILE) } else { path.to_path_buf() };
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to open state machine {}", file.display()))?;
    let machine = StateMachine::from_json(&raw)
        .with_context(|| format!("failed to load state machine {}", file.display()))?;
    Ok(Arc::new(machine))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
