// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! machina-engine: the execution side of Machina.
//!
//! Drives one state machine at a time through its control modes
//! (start/pause/resume/step/stop), running each active state on its own
//! worker thread, coordinating barrier and preemptive concurrency through
//! join queues, and recording an execution history.

pub mod context;
pub mod engine;
pub mod error;
pub mod history;
pub mod mode;
pub(crate) mod runner;

pub use context::ExecutionContext;
pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use history::{ExecutionHistory, HistoryItem, HistoryItemKind};
pub use mode::ExecutionMode;
