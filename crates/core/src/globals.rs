// SPDX-License-Identifier: MIT

//! Process-wide named-value registry with cooperative locking.
//!
//! Instantiated explicitly and threaded through the execution context, so
//! tests get fresh isolates instead of a singleton. Reads hand out cloned
//! snapshots and never contend with the cooperative locks; writes are
//! serialized by the store's map lock, which subsumes per-name ordering.

use crate::value::{DataType, Value};
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::collections::HashMap;
use thiserror::Error;

/// Failure of a global-variable operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GlobalsError {
    #[error("global variable '{name}' is locked")]
    Locked { name: String },

    #[error("global variable '{name}' does not exist")]
    Unknown { name: String },

    #[error("global variable '{name}' expects {expected}, got {actual}")]
    TypeMismatch { name: String, expected: DataType, actual: DataType },
}

#[derive(Debug, Clone)]
struct GlobalEntry {
    value: Value,
    data_type: Option<DataType>,
    locked_by: Option<SmolStr>,
}

/// Named-value registry shared by every state of a running machine.
#[derive(Debug, Default)]
pub struct GlobalVariableStore {
    entries: RwLock<HashMap<SmolStr, GlobalEntry>>,
}

impl GlobalVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, creating it if needed. Fails on a locked variable
    /// and on a declared-type mismatch.
    pub fn set(&self, name: &str, value: Value) -> Result<(), GlobalsError> {
        self.set_inner(name, value, None, None)
    }

    /// Set a variable and declare its type; later `set` calls are checked
    /// against the declaration.
    pub fn set_typed(&self, name: &str, value: Value, data_type: DataType) -> Result<(), GlobalsError> {
        self.set_inner(name, value, None, Some(data_type))
    }

    /// Set a locked variable using the key returned by [`Self::lock`].
    pub fn set_locked(&self, name: &str, key: &str, value: Value) -> Result<(), GlobalsError> {
        self.set_inner(name, value, Some(key), None)
    }

    fn set_inner(
        &self,
        name: &str,
        value: Value,
        key: Option<&str>,
        declare: Option<DataType>,
    ) -> Result<(), GlobalsError> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(name) {
            check_key(name, entry.locked_by.as_deref(), key)?;
            if let Some(declared) = declare.or(entry.data_type) {
                if !declared.accepts_value(&value) {
                    return Err(GlobalsError::TypeMismatch {
                        name: name.to_string(),
                        expected: declared,
                        actual: DataType::of_value(&value),
                    });
                }
            }
            entry.value = value;
            if declare.is_some() {
                entry.data_type = declare;
            }
            return Ok(());
        }
        if let Some(declared) = declare {
            if !declared.accepts_value(&value) {
                return Err(GlobalsError::TypeMismatch {
                    name: name.to_string(),
                    expected: declared,
                    actual: DataType::of_value(&value),
                });
            }
        }
        entries.insert(SmolStr::new(name), GlobalEntry { value, data_type: declare, locked_by: None });
        Ok(())
    }

    /// Snapshot of the current value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.read().get(name).map(|e| e.value.clone())
    }

    /// Declared type, if any.
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.entries.read().get(name).and_then(|e| e.data_type)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Acquire the cooperative lock on a variable; returns the key that
    /// authorizes subsequent `set_locked`/`unlock`/`delete_locked` calls.
    pub fn lock(&self, name: &str) -> Result<String, GlobalsError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| GlobalsError::Unknown { name: name.to_string() })?;
        if entry.locked_by.is_some() {
            return Err(GlobalsError::Locked { name: name.to_string() });
        }
        let key = uuid::Uuid::new_v4().to_string();
        entry.locked_by = Some(SmolStr::new(&key));
        Ok(key)
    }

    /// Release the cooperative lock.
    pub fn unlock(&self, name: &str, key: &str) -> Result<(), GlobalsError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| GlobalsError::Unknown { name: name.to_string() })?;
        match entry.locked_by.as_deref() {
            Some(holder) if holder == key => {
                entry.locked_by = None;
                Ok(())
            }
            Some(_) => Err(GlobalsError::Locked { name: name.to_string() }),
            None => Ok(()),
        }
    }

    /// Remove a variable. Fails on a locked variable.
    pub fn delete(&self, name: &str) -> Result<(), GlobalsError> {
        self.delete_inner(name, None)
    }

    /// Remove a locked variable using its key.
    pub fn delete_locked(&self, name: &str, key: &str) -> Result<(), GlobalsError> {
        self.delete_inner(name, Some(key))
    }

    fn delete_inner(&self, name: &str, key: Option<&str>) -> Result<(), GlobalsError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get(name)
            .ok_or_else(|| GlobalsError::Unknown { name: name.to_string() })?;
        check_key(name, entry.locked_by.as_deref(), key)?;
        entries.remove(name);
        Ok(())
    }

    /// Names currently present, unordered.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().map(|k| k.to_string()).collect()
    }
}

fn check_key(name: &str, holder: Option<&str>, key: Option<&str>) -> Result<(), GlobalsError> {
    match (holder, key) {
        (None, _) => Ok(()),
        (Some(holder), Some(key)) if holder == key => Ok(()),
        (Some(_), _) => Err(GlobalsError::Locked { name: name.to_string() }),
    }
}

#[cfg(test)]
#[path = "globals_tests.rs"]
mod tests;
