// SPDX-License-Identifier: MIT

//! The execution driver.
//!
//! Owns one active state machine at a time and its control mode. The root
//! state runs on a dedicated worker thread; the driver re-checks the mode
//! at every state-unit boundary through [`ExecutionEngine::request_clearance`],
//! which is where pausing and single-stepping take effect.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::history::ExecutionHistory;
use crate::mode::ExecutionMode;
use crate::runner;
use crossbeam_channel::Receiver;
use machina_core::state::{recursively_deactivate, recursively_pause, recursively_preempt, recursively_resume};
use machina_core::{Clock, GlobalVariableStore, LatchBlock, StateMachine, StatePath, StateRef, SystemClock};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often a blocked clearance gate re-checks the preempted latch.
const GATE_POLL: Duration = Duration::from_millis(50);

/// Verdict of a clearance gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clearance {
    /// Run the pending unit.
    Proceed,
    /// Abandon it; the state must preempt.
    Preempt,
    /// Perform one backward unit instead.
    BackwardUnit,
}

#[derive(Debug, Default)]
struct ControlState {
    mode: ExecutionMode,
    /// One-shot permission for the next consuming unit in a stepping mode.
    step_token: bool,
    /// Depth the current stepping operation is anchored at.
    step_origin: usize,
    /// Depth of the unit most recently seen at a gate.
    last_depth: usize,
}

struct ActiveRun {
    machine: Arc<StateMachine>,
    history: Arc<ExecutionHistory>,
    worker: Option<JoinHandle<()>>,
    done_rx: Receiver<Option<i64>>,
    /// Set once the worker reported; `Some(None)` for a backward finish.
    outcome: Option<Option<i64>>,
}

struct EngineInner<C: Clock> {
    clock: C,
    globals: Arc<GlobalVariableStore>,
    control: Mutex<ControlState>,
    cond: Condvar,
    run: Mutex<Option<ActiveRun>>,
}

/// Process-wide driver by intent, explicit context object by design:
/// instantiate one per test to get a fresh isolate.
pub struct ExecutionEngine<C: Clock = SystemClock> {
    inner: Arc<EngineInner<C>>,
}

impl<C: Clock> Clone for ExecutionEngine<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl ExecutionEngine<SystemClock> {
    pub fn new() -> Self {
        Self::with_parts(SystemClock, Arc::new(GlobalVariableStore::new()))
    }

    pub fn with_globals(globals: Arc<GlobalVariableStore>) -> Self {
        Self::with_parts(SystemClock, globals)
    }
}

impl Default for ExecutionEngine<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ExecutionEngine<C> {
    pub fn with_parts(clock: C, globals: Arc<GlobalVariableStore>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                clock,
                globals,
                control: Mutex::new(ControlState::default()),
                cond: Condvar::new(),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.control.lock().mode
    }

    pub fn globals(&self) -> Arc<GlobalVariableStore> {
        Arc::clone(&self.inner.globals)
    }

    /// History of the current (or last) run.
    pub fn history(&self) -> Option<Arc<ExecutionHistory>> {
        self.inner.run.lock().as_ref().map(|r| Arc::clone(&r.history))
    }

    /// Final outcome of the root state once the run finished.
    pub fn outcome(&self) -> Option<i64> {
        let mut run = self.inner.run.lock();
        let active = run.as_mut()?;
        Self::harvest(active);
        active.outcome.flatten()
    }

    /// Begin executing `machine`, optionally at a specific substate.
    pub fn start(
        &self,
        machine: Arc<StateMachine>,
        start_path: Option<StatePath>,
    ) -> Result<(), EngineError> {
        if let Some(path) = &start_path {
            machine.find(path).ok_or_else(|| EngineError::UnknownStartPath(path.to_string()))?;
        }
        {
            let mut run = self.inner.run.lock();
            if let Some(active) = run.as_mut() {
                Self::harvest(active);
                if active.outcome.is_none() {
                    return Err(EngineError::AlreadyRunning);
                }
            }
            *run = None;
        }
        {
            let mut control = self.inner.control.lock();
            if !control.mode.can_start() {
                return Err(EngineError::IllegalControlState { op: "start", mode: control.mode });
            }
            *control = ControlState { mode: ExecutionMode::Started, ..ControlState::default() };
        }

        let history = Arc::new(ExecutionHistory::new());
        let ctx = Arc::new(ExecutionContext::new(
            self.clone(),
            self.globals(),
            Arc::clone(&history),
            start_path,
            self.inner.clock.clone(),
        ));
        let root = machine.root().clone();
        recursively_resume(&root);

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let engine = self.clone();
        let worker_root = root.clone();
        let worker = std::thread::Builder::new()
            .name("machina-engine".into())
            .spawn(move || {
                let outcome = runner::run_state(&worker_root, &ctx, None);
                recursively_deactivate(&worker_root);
                engine.finish_run();
                let _ = done_tx.send(outcome);
            })
            .map_err(|e| {
                self.inner.control.lock().mode = ExecutionMode::Stopped;
                EngineError::Spawn(e.to_string())
            })?;

        *self.inner.run.lock() =
            Some(ActiveRun { machine, history, worker: Some(worker), done_rx, outcome: None });
        tracing::info!("execution started");
        Ok(())
    }

    /// Pause: the currently running leaf keeps running, but no new unit
    /// starts until resumed.
    pub fn pause(&self) -> Result<(), EngineError> {
        let root = self.active_root();
        {
            let mut control = self.inner.control.lock();
            match control.mode {
                ExecutionMode::Paused => return Ok(()),
                m if m.is_stepping() || m == ExecutionMode::Started => {
                    control.mode = ExecutionMode::Paused;
                }
                m => return Err(EngineError::IllegalControlState { op: "pause", mode: m }),
            }
        }
        if let Some(root) = root {
            recursively_pause(&root);
        }
        self.inner.cond.notify_all();
        tracing::debug!("execution paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        let root = self.active_root();
        {
            let mut control = self.inner.control.lock();
            match control.mode {
                ExecutionMode::Started => return Ok(()),
                m if m == ExecutionMode::Paused || m.is_stepping() => {
                    control.mode = ExecutionMode::Started;
                }
                m => return Err(EngineError::IllegalControlState { op: "resume", mode: m }),
            }
        }
        if let Some(root) = root {
            recursively_resume(&root);
        }
        self.inner.cond.notify_all();
        tracing::debug!("execution resumed");
        Ok(())
    }

    /// Enter stepping: like pause, but expresses the intent to advance
    /// unit by unit.
    pub fn step_mode(&self) -> Result<(), EngineError> {
        let root = self.active_root();
        {
            let mut control = self.inner.control.lock();
            match control.mode {
                ExecutionMode::Paused => return Ok(()),
                m if m == ExecutionMode::Started || m.is_stepping() => {
                    control.mode = ExecutionMode::Paused;
                }
                m => return Err(EngineError::IllegalControlState { op: "step_mode", mode: m }),
            }
        }
        if let Some(root) = root {
            recursively_pause(&root);
        }
        self.inner.cond.notify_all();
        Ok(())
    }

    /// Run exactly the next unit, descending into containers.
    pub fn step_into(&self) -> Result<(), EngineError> {
        self.step("step_into", ExecutionMode::ForwardInto)
    }

    /// Run the next unit to completion, children included.
    pub fn step_over(&self) -> Result<(), EngineError> {
        self.step("step_over", ExecutionMode::ForwardOver)
    }

    /// Run until the current container finishes.
    pub fn step_out(&self) -> Result<(), EngineError> {
        self.step("step_out", ExecutionMode::ForwardOut)
    }

    /// Undo one unit of the active container's history.
    pub fn backward_step(&self) -> Result<(), EngineError> {
        self.step("backward_step", ExecutionMode::Backward)
    }

    fn step(&self, op: &'static str, to: ExecutionMode) -> Result<(), EngineError> {
        let root = self.active_root();
        if root.is_none() {
            return Err(EngineError::NoActiveMachine);
        }
        {
            let mut control = self.inner.control.lock();
            match control.mode {
                m if m == ExecutionMode::Paused || m.is_stepping() => {
                    // No gate reached yet means no anchor; the token
                    // consumer then anchors at whatever depth arrives.
                    control.step_origin =
                        if control.last_depth == 0 { usize::MAX } else { control.last_depth };
                    control.step_token = true;
                    control.mode = to;
                }
                m => return Err(EngineError::IllegalControlState { op, mode: m }),
            }
        }
        if let Some(root) = root {
            recursively_resume(&root);
        }
        self.inner.cond.notify_all();
        tracing::debug!(op, "stepping");
        Ok(())
    }

    /// Broadcast preemption and move to `Stopped`. Idempotent.
    pub fn stop(&self) -> Result<(), EngineError> {
        let root = self.active_root();
        {
            let mut control = self.inner.control.lock();
            match control.mode {
                ExecutionMode::Stopped | ExecutionMode::Finished => return Ok(()),
                _ => control.mode = ExecutionMode::Stopped,
            }
        }
        if let Some(root) = root {
            recursively_preempt(&root);
        }
        self.inner.cond.notify_all();
        tracing::info!("execution stopped");
        Ok(())
    }

    /// Wait for the worker to finish; returns `false` on timeout.
    pub fn join(&self, timeout: Option<Duration>) -> bool {
        let rx = {
            let mut run = self.inner.run.lock();
            let Some(active) = run.as_mut() else {
                return true;
            };
            if active.outcome.is_some() {
                return true;
            }
            active.done_rx.clone()
        };
        let received = match timeout {
            Some(timeout) => rx.recv_timeout(timeout).ok(),
            None => rx.recv().ok(),
        };
        let Some(outcome) = received else {
            return false;
        };
        let mut run = self.inner.run.lock();
        if let Some(active) = run.as_mut() {
            active.outcome = Some(outcome);
            if let Some(worker) = active.worker.take() {
                let _ = worker.join();
            }
        }
        true
    }

    fn active_root(&self) -> Option<StateRef> {
        self.inner.run.lock().as_ref().map(|r| r.machine.root().clone())
    }

    /// Pull a finished outcome out of the done channel without blocking.
    fn harvest(active: &mut ActiveRun) {
        if active.outcome.is_none() {
            if let Ok(outcome) = active.done_rx.try_recv() {
                active.outcome = Some(outcome);
                if let Some(worker) = active.worker.take() {
                    let _ = worker.join();
                }
            }
        }
    }

    fn finish_run(&self) {
        let mut control = self.inner.control.lock();
        control.mode = ExecutionMode::Finished;
        self.inner.cond.notify_all();
        tracing::info!("execution finished");
    }

    /// Gate called by the runner before every state unit. Blocks while
    /// paused, hands out step tokens, and converts stops into preemption.
    pub(crate) fn request_clearance(&self, depth: usize, latches: &LatchBlock) -> Clearance {
        loop {
            if latches.preempted() {
                return Clearance::Preempt;
            }
            let mut control = self.inner.control.lock();
            control.last_depth = depth;
            match control.mode {
                ExecutionMode::Started => return Clearance::Proceed,
                ExecutionMode::Stopped | ExecutionMode::Finished | ExecutionMode::Created => {
                    return Clearance::Preempt;
                }
                ExecutionMode::Paused => {}
                ExecutionMode::ForwardInto => {
                    if std::mem::take(&mut control.step_token) {
                        return Clearance::Proceed;
                    }
                    control.mode = ExecutionMode::Paused;
                }
                ExecutionMode::ForwardOver => {
                    if depth > control.step_origin {
                        return Clearance::Proceed;
                    }
                    if std::mem::take(&mut control.step_token) {
                        control.step_origin = depth;
                        return Clearance::Proceed;
                    }
                    control.mode = ExecutionMode::Paused;
                }
                ExecutionMode::ForwardOut => {
                    if depth >= control.step_origin {
                        return Clearance::Proceed;
                    }
                    control.mode = ExecutionMode::Paused;
                }
                ExecutionMode::Backward => {
                    if std::mem::take(&mut control.step_token) {
                        return Clearance::BackwardUnit;
                    }
                    control.mode = ExecutionMode::Paused;
                }
            }
            // Paused, or a stepping mode out of tokens: wait for a mode
            // change, waking periodically to observe preemption.
            let _ = self.inner.cond.wait_for(&mut control, GATE_POLL);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
