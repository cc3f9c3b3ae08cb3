//! Collaborator traits: confirmation and progress
//!
//! These let the library run without depending on a particular terminal UI.

use anyhow::Result;
use std::fmt;

/// Kind of change awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Install,
    Update,
    Checkout,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Install => "install",
            ActionKind::Update => "update",
            ActionKind::Checkout => "checkout",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change presented to the user before it is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Plugin name (or directory name for orphans)
    pub plugin: String,
    pub action: ActionKind,
    /// Human-readable, possibly multi-line, description
    pub summary: String,
}

impl PendingAction {
    pub fn new(plugin: impl Into<String>, action: ActionKind, summary: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            action,
            summary: summary.into(),
        }
    }
}

/// Confirmation callback for user interaction
///
/// Implement this trait to approve or reject a batch of changes.
pub trait ConfirmCallback: Send {
    /// Ask the user to approve `actions`.
    ///
    /// # Returns
    /// `true` if the whole batch is approved
    fn confirm(&mut self, actions: &[PendingAction]) -> Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _actions: &[PendingAction]) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _actions: &[PendingAction]) -> Result<bool> {
        Ok(false)
    }
}

/// Progress callback for long-running batches
///
/// Calls are made from the orchestrating thread only.
pub trait ProgressCallback: Send {
    /// Called before a batch of `count` plugins starts
    fn on_batch_start(&mut self, label: &str, count: usize);

    /// Called when the batch has finished
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _label: &str, _count: usize) {}
    fn on_batch_complete(&mut self) {}
}
