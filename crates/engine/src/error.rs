// SPDX-License-Identifier: MIT

//! Engine-side errors.

use crate::mode::ExecutionMode;
use machina_core::ModelError;
use thiserror::Error;

/// Failure of a driver operation. Execution errors inside state bodies
/// never surface here; they become reserved outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("illegal control state: cannot {op} while {mode}")]
    IllegalControlState { op: &'static str, mode: ExecutionMode },

    #[error("a state machine is already running")]
    AlreadyRunning,

    #[error("no active state machine")]
    NoActiveMachine,

    #[error("start state path '{0}' does not resolve")]
    UnknownStartPath(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}
