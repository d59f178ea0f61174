// SPDX-License-Identifier: MIT

//! Per-state event latches.
//!
//! Every state owns one latch block with the three binary latches
//! `preempted`, `paused` and `started`. Workers observe them at suspension
//! points; the composite waits mirror the conditions the runner needs:
//! `interrupted = preempted or paused`, `unpaused = preempted or started`.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    preempted: bool,
    paused: bool,
    started: bool,
}

/// Latch block shared between a state and the workers observing it.
///
/// Lives outside the state's lock so waits never hold the tree.
#[derive(Default)]
pub struct LatchBlock {
    flags: Mutex<Flags>,
    cond: Condvar,
}

impl std::fmt::Debug for LatchBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = *self.flags.lock();
        f.debug_struct("LatchBlock")
            .field("preempted", &flags.preempted)
            .field("paused", &flags.paused)
            .field("started", &flags.started)
            .finish()
    }
}

impl LatchBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `preempted`. Clears `paused` and `started` so every composite
    /// wait returns.
    pub fn set_preempted(&self) {
        let mut flags = self.flags.lock();
        flags.preempted = true;
        flags.paused = false;
        flags.started = false;
        self.cond.notify_all();
    }

    /// Clear `preempted` for a fresh run.
    pub fn clear_preempted(&self) {
        self.flags.lock().preempted = false;
    }

    /// Set `paused`, clear `started`.
    pub fn pause(&self) {
        let mut flags = self.flags.lock();
        flags.paused = true;
        flags.started = false;
        self.cond.notify_all();
    }

    /// Set `started`, clear `paused`.
    pub fn resume(&self) {
        let mut flags = self.flags.lock();
        flags.started = true;
        flags.paused = false;
        self.cond.notify_all();
    }

    pub fn preempted(&self) -> bool {
        self.flags.lock().preempted
    }

    pub fn paused(&self) -> bool {
        self.flags.lock().paused
    }

    pub fn started(&self) -> bool {
        self.flags.lock().started
    }

    /// Wait until `preempted` or `paused` is set. Returns `true` if an
    /// event was set, `false` on timeout (`None` waits forever).
    pub fn wait_for_interruption(&self, timeout: Option<Duration>) -> bool {
        self.wait_where(|f| f.preempted || f.paused, timeout)
    }

    /// Wait until `preempted` or `started` is set. Returns `true` if an
    /// event was set, `false` on timeout (`None` waits forever).
    pub fn wait_for_unpause(&self, timeout: Option<Duration>) -> bool {
        self.wait_where(|f| f.preempted || f.started, timeout)
    }

    /// Wait up to `duration` for preemption; returns `true` iff preempted
    /// before the timeout. Time spent paused does not count against the
    /// budget, so a paused state makes no progress here.
    pub fn preemptive_wait(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        let mut flags = self.flags.lock();
        loop {
            if flags.preempted {
                return true;
            }
            if flags.paused {
                // Suspended: wait for resume or preemption without
                // consuming the budget.
                self.cond.wait(&mut flags);
                continue;
            }
            if remaining.is_zero() {
                return false;
            }
            let slice_start = Instant::now();
            let timed_out = self.cond.wait_for(&mut flags, remaining).timed_out();
            if timed_out {
                return flags.preempted;
            }
            remaining = remaining.saturating_sub(slice_start.elapsed());
        }
    }

    fn wait_where(&self, cond: impl Fn(&Flags) -> bool, timeout: Option<Duration>) -> bool {
        let mut flags = self.flags.lock();
        match timeout {
            None => {
                while !cond(&flags) {
                    self.cond.wait(&mut flags);
                }
                true
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !cond(&flags) {
                    if self.cond.wait_until(&mut flags, deadline).timed_out() {
                        return cond(&flags);
                    }
                }
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "latch_tests.rs"]
mod tests;
