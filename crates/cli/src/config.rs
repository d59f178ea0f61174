// SPDX-License-Identifier: MIT

//! TOML configuration.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration of the binary.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tracing filter, e.g. `info` or `machina_engine=debug`.
    pub log_filter: Option<String>,
    /// Extra library search paths handed to the library loader, on top of
    /// `MACHINA_LIB_PATH`.
    pub library_paths: Vec<PathBuf>,
    /// Seconds to wait for an orderly stop after a shutdown signal.
    pub stop_timeout_secs: u64,
}

const DEFAULT_STOP_TIMEOUT_SECS: u64 = 3;

impl Config {
    /// Resolve the configuration: an explicit path must exist, the literal
    /// `none` disables loading, and with no flag the default location is
    /// used when present.
    pub fn load(arg: Option<&Path>) -> anyhow::Result<Config> {
        match arg {
            Some(path) if path.as_os_str() == "none" => Ok(Config::fallback()),
            Some(path) => Config::read(path),
            None => match Config::default_path() {
                Some(path) if path.exists() => Config::read(&path),
                _ => Ok(Config::fallback()),
            },
        }
    }

    fn read(path: &Path) -> anyhow::Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        if config.stop_timeout_secs == 0 {
            config.stop_timeout_secs = DEFAULT_STOP_TIMEOUT_SECS;
        }
        Ok(config)
    }

    fn fallback() -> Config {
        Config { stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS, ..Config::default() }
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("machina").join("config.toml"))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
