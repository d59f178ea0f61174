// SPDX-License-Identifier: MIT

//! Shutdown signal handling.
//!
//! Signals are blocked in the main thread before anything else spawns, so
//! every later thread inherits the mask; a dedicated waiter thread then
//! picks them up synchronously with `sigwait`.

use nix::sys::signal::{SigSet, Signal};
use std::thread::JoinHandle;

const SHUTDOWN_SIGNALS: [Signal; 4] =
    [Signal::SIGINT, Signal::SIGHUP, Signal::SIGQUIT, Signal::SIGTERM];

/// Block the shutdown signals in the calling thread and return the set.
pub fn block_shutdown_signals() -> nix::Result<SigSet> {
    let mut set = SigSet::empty();
    for signal in SHUTDOWN_SIGNALS {
        set.add(signal);
    }
    set.thread_block()?;
    Ok(set)
}

/// Wait for the first blocked shutdown signal on a dedicated thread.
pub fn spawn_signal_waiter(
    set: SigSet,
    on_signal: impl FnOnce(Signal) + Send + 'static,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name("machina-signals".into()).spawn(move || match set.wait() {
        Ok(signal) => on_signal(signal),
        Err(errno) => tracing::error!(%errno, "sigwait failed"),
    })
}
