//! Options and summaries for manager operations

use std::path::PathBuf;

/// Options for [`crate::Manager::add`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Install touched plugins that are not on disk yet
    pub install_missing: bool,
}

/// Options for [`crate::Manager::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Skip confirmation
    pub force: bool,
    /// Do not fetch; use what is already downloaded
    pub offline: bool,
}

/// Options for [`crate::Manager::clean`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Skip confirmation
    pub force: bool,
}

/// Per-plugin outcome counts of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Plugins whose checkout moved (or that were installed)
    pub changed: Vec<String>,
    /// Plugins already at their target
    pub unchanged: Vec<String>,
    /// Plugins whose pipeline stopped on an error
    pub failed: Vec<String>,
    /// The user rejected the changes
    pub declined: bool,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.changed.len() + self.unchanged.len() + self.failed.len()
    }
}

/// Outcome of a clean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Orphans found on disk
    pub orphans: Vec<PathBuf>,
    /// Orphans removed (deleted or trashed)
    pub removed: Vec<PathBuf>,
    /// Orphans that could not be removed
    pub failed: Vec<PathBuf>,
    pub declined: bool,
}
