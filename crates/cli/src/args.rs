// SPDX-License-Identifier: MIT

//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "machina", version, about = "Hierarchical state-machine runtime")]
pub struct Args {
    /// State machine files or directories to open, executed in order
    #[arg(short = 'o', long = "open", value_name = "PATH", num_args = 1..)]
    pub open: Vec<PathBuf>,

    /// Configuration file; pass `none` to disable loading
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not auto-start execution; wait for external control
    #[arg(long)]
    pub remote: bool,

    /// Absolute `/`-joined path of the state to start execution at
    #[arg(short = 's', long = "start-state-path", value_name = "PATH")]
    pub start_state_path: Option<String>,
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
