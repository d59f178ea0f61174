// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! machina: thin command-line front end for the execution engine.

mod args;
mod config;
mod loader;
mod signal;

use anyhow::bail;
use args::Args;
use clap::Parser;
use config::Config;
use machina_core::{StatePath, OUTCOME_ABORTED, OUTCOME_PREEMPTED};
use machina_engine::ExecutionEngine;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("machina: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    // Must happen before any thread spawns so the mask is inherited.
    let signal_set = signal::block_shutdown_signals()?;
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    init_tracing(&config);

    if args.open.is_empty() {
        bail!("no state machine given; use -o/--open");
    }
    let start_path = match args.start_state_path.as_deref() {
        Some(raw) => match StatePath::parse(raw) {
            Some(path) if !path.is_empty() => Some(path),
            _ => bail!("invalid start state path '{raw}'"),
        },
        None => None,
    };
    if !config.library_paths.is_empty() {
        tracing::debug!(paths = ?config.library_paths, "library search paths configured");
    }

    let engine = ExecutionEngine::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let engine = engine.clone();
        let shutdown = Arc::clone(&shutdown);
        signal::spawn_signal_waiter(signal_set, move |sig| {
            tracing::info!(signal = %sig, "shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
            let _ = engine.stop();
        })?;
    }

    if args.remote {
        tracing::info!("remote mode; execution is driven externally");
        for path in &args.open {
            loader::open_machine(path)?;
        }
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
        }
        return Ok(());
    }

    for path in &args.open {
        let machine = loader::open_machine(path)?;
        tracing::info!(machine = %path.display(), "starting state machine");
        engine.start(Arc::clone(&machine), start_path.clone())?;

        loop {
            if engine.join(Some(Duration::from_millis(200))) {
                break;
            }
            if shutdown.load(Ordering::SeqCst) {
                if !engine.join(Some(Duration::from_secs(config.stop_timeout_secs))) {
                    tracing::warn!("execution did not stop in time");
                }
                break;
            }
        }
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!("stopped by signal");
            return Ok(());
        }
        match engine.outcome() {
            Some(OUTCOME_ABORTED) => bail!("state machine {} aborted", path.display()),
            Some(OUTCOME_PREEMPTED) => tracing::info!("state machine preempted"),
            outcome => tracing::info!(?outcome, "state machine finished"),
        }
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = std::env::var("MACHINA_LOG")
        .ok()
        .or_else(|| config.log_filter.clone())
        .unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
