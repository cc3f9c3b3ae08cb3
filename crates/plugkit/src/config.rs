//! Manager configuration
//!
//! Precedence, highest first: explicit per-call override, local override,
//! global defaults.

use crate::paths::Layout;
use crate::scheduler::default_threads;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "plugman";

/// Full configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub job: JobConfig,
    pub path: PathConfig,
    /// Only warnings and errors are notified
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Parallel jobs; CPU count when unset
    pub n_threads: Option<usize>,
    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Package root; plugins live under `<package>/pack/deps`
    pub package: PathBuf,
    /// Default snapshot file
    pub snapshot: PathBuf,
    /// Update log file
    pub log: PathBuf,
    /// Where cleaned plugins are moved; deleted when unset
    pub trash: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job: JobConfig::default(),
            path: PathConfig::default(),
            silent: false,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            n_threads: None,
            timeout_ms: 30_000,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        let state = dirs::state_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| data.clone());

        Self {
            package: data.join("site"),
            snapshot: config.join("snapshot.toml"),
            log: state.join("update.log"),
            trash: None,
        }
    }
}

/// Partial configuration; unset fields leave the base value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverride {
    pub job: JobOverride,
    pub path: PathOverride,
    pub silent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOverride {
    pub n_threads: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOverride {
    pub package: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub trash: Option<PathBuf>,
}

impl Config {
    /// Overwrite every field `patch` sets.
    pub fn apply(&mut self, patch: &ConfigOverride) {
        if let Some(n) = patch.job.n_threads {
            self.job.n_threads = Some(n);
        }
        if let Some(ms) = patch.job.timeout_ms {
            self.job.timeout_ms = ms;
        }
        if let Some(package) = &patch.path.package {
            self.path.package = package.clone();
        }
        if let Some(snapshot) = &patch.path.snapshot {
            self.path.snapshot = snapshot.clone();
        }
        if let Some(log) = &patch.path.log {
            self.path.log = log.clone();
        }
        if let Some(trash) = &patch.path.trash {
            self.path.trash = Some(trash.clone());
        }
        if let Some(silent) = patch.silent {
            self.silent = silent;
        }
    }

    /// `explicit` > `local` > `global`.
    pub fn merged(
        global: Config,
        local: Option<&ConfigOverride>,
        explicit: Option<&ConfigOverride>,
    ) -> Config {
        let mut config = global;
        for patch in [local, explicit].into_iter().flatten() {
            config.apply(patch);
        }
        config
    }

    /// Effective worker count, at least 1.
    pub fn n_threads(&self) -> usize {
        self.job.n_threads.unwrap_or_else(default_threads).max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.job.timeout_ms)
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.path.package)
    }
}
