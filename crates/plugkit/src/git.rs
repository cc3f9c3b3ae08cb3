//! Git command construction and execution
//!
//! [`Git`] knows the exact argument shapes of every git call the pipeline
//! makes and turns each [`JobResult`] into either trimmed stdout, a warning
//! (exit 0 with stderr) or an [`Error::Process`].

use crate::error::{Error, Result};
use crate::scheduler::{CommandRunner, JobResult, JobStatus, Job};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of stash messages created before a checkout.
pub const STASH_PREFIX: &str = "(plugkit)";

/// Format of range logs.
pub const LOG_FORMAT: &str = "--pretty=format:%m %h | %ai | %an%d%n  %s%n";

/// Parsed `git version` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `git version 2.43.0`, `git version 2.39.3 (Apple Git-146)` and
    /// similar.
    pub fn parse(output: &str) -> Option<Self> {
        let version = output
            .split_whitespace()
            .skip_while(|word| *word != "version")
            .nth(1)?;

        let mut parts = version.split('.').map(leading_number);
        let major = parts.next()??;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// `clone --also-filter-submodules` exists since 2.36.
    pub fn supports_also_filter_submodules(&self) -> bool {
        *self >= Self::new(2, 36, 0)
    }

    /// `clone --filter=blob:none` is reliable since 2.27.
    pub fn supports_blob_filter(&self) -> bool {
        *self >= Self::new(2, 27, 0)
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// A verified git executable plus the runner that launches it.
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    executable: String,
    timeout: Duration,
    version: GitVersion,
}

impl fmt::Debug for Git {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Git")
            .field("executable", &self.executable)
            .field("timeout", &self.timeout)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Git {
    /// Run `git version` once and keep the result.
    ///
    /// Fails with [`Error::MissingExecutable`] when git cannot be run or its
    /// version cannot be parsed.
    pub fn detect(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Result<Self> {
        Self::detect_executable(runner, "git", timeout)
    }

    /// Like [`Git::detect`] with a custom executable.
    pub fn detect_executable(
        runner: Arc<dyn CommandRunner>,
        executable: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let job = Job::new(executable, ["version"]).with_timeout(timeout);
        let result = runner.run(&job);
        if result.status() == JobStatus::Failed {
            return Err(Error::MissingExecutable {
                reason: result.stderr.trim().to_string(),
            });
        }

        let version = GitVersion::parse(&result.stdout).ok_or_else(|| Error::MissingExecutable {
            reason: format!("unrecognized version output: {:?}", result.stdout.trim()),
        })?;
        log::debug!("Detected git {version}");

        Ok(Self {
            runner,
            executable: executable.to_string(),
            timeout,
            version,
        })
    }

    pub fn version(&self) -> GitVersion {
        self.version
    }

    /// Build a job, prefixed with `-C <path>` when a path is given.
    pub fn job(&self, path: Option<&Path>, args: Vec<String>) -> Job {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(path) = path {
            full.push("-C".to_string());
            full.push(path.display().to_string());
        }
        full.extend(args);
        Job::new(self.executable.as_str(), full).with_timeout(self.timeout)
    }

    /// Run one pipeline step for `plugin`.
    ///
    /// Returns trimmed stdout. Stderr on a successful run is pushed onto
    /// `warnings`; a failed run becomes [`Error::Process`].
    pub fn exec(
        &self,
        plugin: &str,
        step: &'static str,
        path: Option<&Path>,
        args: Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let job = self.job(path, args);
        log::debug!("[{plugin}] {step}: {}", job.command_line());
        let result = self.runner.run(&job);
        into_output(plugin, step, result, warnings)
    }

    pub fn clone_args(&self, source: &str, path: &Path) -> Vec<String> {
        let mut args = vec!["clone".to_string(), "--quiet".to_string()];
        if self.version.supports_blob_filter() {
            args.push("--filter=blob:none".to_string());
        }
        args.push("--recurse-submodules".to_string());
        if self.version.supports_also_filter_submodules() {
            args.push("--also-filter-submodules".to_string());
        }
        args.extend([
            "--origin".to_string(),
            "origin".to_string(),
            source.to_string(),
            path.display().to_string(),
        ]);
        args
    }
}

fn into_output(
    plugin: &str,
    step: &'static str,
    result: JobResult,
    warnings: &mut Vec<String>,
) -> Result<String> {
    match result.status() {
        JobStatus::Success => Ok(result.stdout.trim().to_string()),
        JobStatus::Warning => {
            warnings.push(format!("{step}: {}", result.stderr.trim()));
            Ok(result.stdout.trim().to_string())
        }
        JobStatus::Failed => Err(Error::Process {
            plugin: plugin.to_string(),
            step,
            exit_code: result.exit_code,
            stderr: result.stderr.trim().to_string(),
        }),
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

pub fn rev_list_args(rev: &str) -> Vec<String> {
    args(["rev-list", "-1", rev])
}

pub fn default_branch_args() -> Vec<String> {
    args(["rev-parse", "--abbrev-ref", "origin/HEAD"])
}

pub fn branch_list_args(remote_ref: &str) -> Vec<String> {
    args([
        "branch",
        "--list",
        "--all",
        "--format=%(refname:short)",
        remote_ref,
    ])
}

pub fn fetch_args() -> Vec<String> {
    args([
        "fetch",
        "--quiet",
        "--tags",
        "--force",
        "--recurse-submodules=yes",
        "origin",
    ])
}

pub fn set_url_args(source: &str) -> Vec<String> {
    args(["remote", "set-url", "origin", source])
}

pub fn get_url_args() -> Vec<String> {
    args(["remote", "get-url", "origin"])
}

pub fn stash_args(timestamp: &str) -> Vec<String> {
    let message = format!("{STASH_PREFIX} {timestamp} Stash before checkout");
    args(["stash", "--quiet", "--message", &message])
}

pub fn checkout_args(commit: &str) -> Vec<String> {
    args(["checkout", "--quiet", commit])
}

pub fn log_args(from: &str, to: &str) -> Vec<String> {
    let range = format!("{from}...{to}");
    args([
        "log",
        LOG_FORMAT,
        "--topo-order",
        "--decorate-refs=refs/tags",
        &range,
    ])
}
