//! # plugkit
//!
//! Pure Rust core of a git-backed plugin manager.
//!
//! This crate provides functionality for:
//! - Declaring plugins and resolving their dependencies (cycles tolerated)
//! - Installing and updating plugins with parallel, time-limited git jobs
//! - Capturing and restoring exact revisions with snapshots
//! - Removing plugin directories that are no longer declared
//!
//! ## Example
//!
//! ```no_run
//! use plugkit::{AddOptions, Config, Manager, PluginSpec, UpdateOptions};
//!
//! let mut manager = Manager::new(Config::default());
//!
//! // Dependencies are registered (and installed) before their dependents
//! let spec = PluginSpec::from_source("nvim-telescope/telescope.nvim")
//!     .with_checkout("0.1.8")
//!     .with_dependency("nvim-lua/plenary.nvim");
//! manager.add(spec, AddOptions { install_missing: true })?;
//!
//! // Fetch everything and check out new revisions
//! let summary = manager.update(&[], UpdateOptions::default())?;
//! println!("{} updated", summary.changed.len());
//!
//! // Pin the current state
//! manager.snap_save(None)?;
//! # Ok::<(), plugkit::Error>(())
//! ```
//!
//! ## Collaborators
//!
//! The manager talks to its host through traits:
//!
//! - [`CommandRunner`]: launches git (tests use a scripted runner)
//! - [`ConfirmCallback`]: approves pending updates and deletions
//! - [`Notifier`]: receives user-facing messages
//! - [`ProgressCallback`]: hears about batch start and end

#![warn(clippy::all)]

pub mod clean;
pub mod config;
pub mod context;
pub mod deferred;
pub mod error;
pub mod git;
pub mod helptags;
pub mod hooks;
pub mod manager;
pub mod notify;
pub mod paths;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod spec;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::{Config, ConfigOverride, JobConfig, JobOverride, PathConfig, PathOverride};
pub use context::{
    ActionKind, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, PendingAction,
    ProgressCallback,
};
pub use deferred::{DeferredErrors, TaskQueues};
pub use error::{Error, ErrorCategory, Result};
pub use hooks::{Hook, HookContext, HookKind, Hooks};
pub use manager::Manager;
pub use notify::{Level, LogNotifier, MemoryNotifier, Notifier};
pub use paths::Layout;
pub use scheduler::{CommandRunner, Job, JobResult, JobStatus, ProcessRunner};
pub use session::{Session, SessionEntry};
pub use snapshot::Snapshot;
pub use spec::PluginSpec;
pub use types::{AddOptions, BatchSummary, CleanOptions, CleanSummary, UpdateOptions};
