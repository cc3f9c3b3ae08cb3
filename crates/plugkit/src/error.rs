//! Error types for plugin management.
//!
//! Errors are split into two groups. Validation errors and a missing git
//! binary are fatal and returned synchronously from the call that hit them.
//! Everything else is scoped to a single plugin: it is recorded on that
//! plugin's report and surfaced as a notification once the batch is done.

use std::path::PathBuf;
use thiserror::Error;

use crate::hooks::HookKind;
use crate::scheduler::TIMEOUT_EXIT_CODE;

/// Categories of plugin manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// git is not installed or not runnable
    MissingExecutable,
    /// A plugin's remote could not be determined
    RepoResolution,
    /// A subprocess exited with a non-zero code
    Process,
    /// A subprocess was killed after exceeding its timeout
    Timeout,
    /// A user hook failed
    Hook,
    /// A plugin declaration was rejected
    InvalidSpec,
    /// A snapshot was rejected
    InvalidSnapshot,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether errors of this category abort the whole operation.
    ///
    /// Non-fatal categories only fail the plugin they belong to.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingExecutable | Self::InvalidSpec | Self::InvalidSnapshot
        )
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingExecutable => "git not available",
            Self::RepoResolution => "Unknown plugin source",
            Self::Process => "Command failed",
            Self::Timeout => "Command timed out",
            Self::Hook => "Hook failed",
            Self::InvalidSpec => "Invalid plugin spec",
            Self::InvalidSnapshot => "Invalid snapshot",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while managing plugins.
#[derive(Debug, Error)]
pub enum Error {
    /// The git executable is missing or could not be queried
    #[error("git executable not available: {reason}")]
    MissingExecutable {
        /// Why the executable check failed
        reason: String,
    },

    /// The remote of a plugin could not be determined
    #[error("cannot determine source of plugin '{plugin}': {reason}")]
    RepoResolution {
        /// Plugin name
        plugin: String,
        /// Details
        reason: String,
    },

    /// A git step exited with a non-zero code or was killed on timeout
    #[error("{step} failed for '{plugin}' (exit code {exit_code}): {stderr}")]
    Process {
        /// Plugin name
        plugin: String,
        /// Pipeline step that failed
        step: &'static str,
        /// Exit code of the process
        exit_code: i32,
        /// Standard error of the process
        stderr: String,
    },

    /// A user hook returned an error
    #[error("error in {kind} hook of '{plugin}': {message}")]
    Hook {
        /// Plugin name
        plugin: String,
        /// Which hook failed
        kind: HookKind,
        /// Error message produced by the hook
        message: String,
    },

    /// A plugin declaration failed validation
    #[error("invalid plugin spec: `{field}` {reason}")]
    InvalidSpec {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// A snapshot failed validation
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Snapshot or log file could not be found
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Thread pool could not be created
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingExecutable { .. } => ErrorCategory::MissingExecutable,
            Error::RepoResolution { .. } => ErrorCategory::RepoResolution,
            Error::Process { exit_code, .. } if *exit_code == TIMEOUT_EXIT_CODE => {
                ErrorCategory::Timeout
            }
            Error::Process { .. } => ErrorCategory::Process,
            Error::Hook { .. } => ErrorCategory::Hook,
            Error::InvalidSpec { .. } => ErrorCategory::InvalidSpec,
            Error::InvalidSnapshot(_) => ErrorCategory::InvalidSnapshot,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error aborts the whole operation.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Shorthand for an `InvalidSpec` error.
    pub fn invalid_spec(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidSpec {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for plugin manager operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_categories() {
        assert!(ErrorCategory::MissingExecutable.is_fatal());
        assert!(ErrorCategory::InvalidSpec.is_fatal());
        assert!(ErrorCategory::InvalidSnapshot.is_fatal());
        assert!(!ErrorCategory::Process.is_fatal());
        assert!(!ErrorCategory::Timeout.is_fatal());
        assert!(!ErrorCategory::Hook.is_fatal());
    }

    #[test]
    fn test_timeout_message_mentions_timeout() {
        let err = Error::Process {
            plugin: "foo".to_string(),
            step: "fetch",
            exit_code: TIMEOUT_EXIT_CODE,
            stderr: crate::scheduler::TIMEOUT_MESSAGE.to_string(),
        };
        assert!(err.to_string().contains("TIMEOUT"));
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[test]
    fn test_invalid_spec_names_field() {
        let err = Error::invalid_spec("name", "must not contain path separators");
        assert!(err.to_string().contains("`name`"));
        assert!(err.is_fatal());
    }
}
