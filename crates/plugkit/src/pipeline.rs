//! Per-plugin git state machine
//!
//! Each function here runs the steps for ONE plugin on a worker thread and
//! records everything it learns on a [`PluginReport`]. The first failing
//! step stops that plugin's pipeline; other plugins are unaffected.
//!
//! ```text
//! install:  clone -> head -> resolve target -> checkout
//! fetch:    set/get origin -> fetch -> head -> resolve targets -> logs
//! checkout: stash -> checkout            (only when head != target)
//! ```

use crate::error::{Error, Result};
use crate::git::{self, Git};
use crate::session::SessionEntry;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Owned copy of the session fields a worker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginTarget {
    /// Position in the session
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub source: Option<String>,
    pub checkout: Option<String>,
    pub monitor: Option<String>,
}

impl PluginTarget {
    pub fn from_entry(index: usize, entry: &SessionEntry) -> Self {
        Self {
            index,
            name: entry.name.clone(),
            path: entry.path.clone(),
            source: entry.source.clone(),
            checkout: entry.checkout.clone(),
            monitor: entry.monitor.clone(),
        }
    }

    /// Replace the checkout target, e.g. with a snapshot hash.
    pub fn with_checkout(mut self, checkout: impl Into<String>) -> Self {
        self.checkout = Some(checkout.into());
        self
    }
}

/// Revisions resolved for a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitState {
    /// Commit checked out before any change
    pub head: Option<String>,
    /// Remote default branch, when it had to be queried
    pub default_branch: Option<String>,
    pub checkout_ref: Option<String>,
    pub checkout_commit: Option<String>,
    pub monitor_ref: Option<String>,
    pub monitor_commit: Option<String>,
    /// `head...checkout` log
    pub log_checkout: String,
    /// `checkout...monitor` log
    pub log_monitor: String,
}

/// Outcome of running a pipeline for one plugin.
#[derive(Debug)]
pub struct PluginReport {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub source: Option<String>,
    pub state: CommitState,
    /// Non-fatal problems, in the order they happened
    pub warnings: Vec<String>,
    /// The step error that stopped this plugin, if any
    pub error: Option<Error>,
    /// A clone was made by this run
    pub installed: bool,
    /// A checkout was made by this run
    pub checked_out: bool,
}

impl PluginReport {
    pub fn new(target: &PluginTarget) -> Self {
        Self {
            index: target.index,
            name: target.name.clone(),
            path: target.path.clone(),
            source: target.source.clone(),
            state: CommitState::default(),
            warnings: Vec::new(),
            error: None,
            installed: false,
            checked_out: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the checkout target differs from the current head.
    pub fn needs_checkout(&self) -> bool {
        match (&self.state.head, &self.state.checkout_commit) {
            (Some(head), Some(target)) => head != target,
            _ => false,
        }
    }

    /// Whether the monitor branch has commits not in the checkout target.
    pub fn has_monitor_changes(&self) -> bool {
        !self.state.log_monitor.trim().is_empty()
    }

    fn fail(&mut self, error: Error) {
        log::warn!("{error}");
        self.error = Some(error);
    }

    /// Short description used for confirmation prompts.
    pub fn summary(&self) -> String {
        let state = &self.state;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} -> {} ({})",
            short(state.head.as_deref()),
            short(state.checkout_commit.as_deref()),
            state.checkout_ref.as_deref().unwrap_or("?"),
        );
        if !state.log_checkout.is_empty() {
            let _ = writeln!(out, "{}", state.log_checkout.trim_end());
        }
        out.trim_end().to_string()
    }

    /// Report block appended to the update log.
    pub fn log_block(&self) -> String {
        let state = &self.state;
        let mut out = String::new();
        let _ = writeln!(out, "+++ {} +++", self.name);
        let _ = writeln!(out, "Path:         {}", self.path.display());
        let _ = writeln!(out, "Source:       {}", self.source.as_deref().unwrap_or("<none>"));
        let _ = writeln!(out, "State before: {}", state.head.as_deref().unwrap_or("<none>"));
        let _ = writeln!(
            out,
            "State after:  {} ({})",
            state.checkout_commit.as_deref().unwrap_or("<none>"),
            state.checkout_ref.as_deref().unwrap_or("<none>"),
        );

        if !state.log_checkout.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Pending updates from `{}`:",
                state.checkout_ref.as_deref().unwrap_or("<none>")
            );
            let _ = writeln!(out, "{}", state.log_checkout.trim_end());
        }

        if !state.log_monitor.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Monitor updates from `{}`:",
                state.monitor_ref.as_deref().unwrap_or("<none>")
            );
            let _ = writeln!(out, "{}", state.log_monitor.trim_end());
        }
        out
    }
}

fn short(hash: Option<&str>) -> &str {
    match hash {
        Some(h) => h.get(..7).unwrap_or(h),
        None => "<none>",
    }
}

/// Which targets the resolve step should compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolve {
    /// Checkout target only
    Checkout,
    /// Checkout and monitor targets, plus both logs
    WithMonitor,
}

/// Clone a missing plugin and check out its target.
pub fn install(git: &Git, target: &PluginTarget) -> PluginReport {
    let mut report = PluginReport::new(target);
    if let Err(e) = install_steps(git, target, &mut report) {
        report.fail(e);
    }
    report
}

fn install_steps(git: &Git, target: &PluginTarget, report: &mut PluginReport) -> Result<()> {
    let source = target
        .source
        .as_deref()
        .ok_or_else(|| Error::RepoResolution {
            plugin: target.name.clone(),
            reason: "no source declared".to_string(),
        })?;

    if let Some(parent) = target.path.parent() {
        fs::create_dir_all(parent)?;
    }
    let existed = target.path.exists();
    let cloned = git.exec(
        &target.name,
        "clone",
        None,
        git.clone_args(source, &target.path),
        &mut report.warnings,
    );
    if let Err(e) = cloned {
        // A killed clone leaves a partial tree that would count as installed
        if !existed {
            remove_partial_clone(&target.path);
        }
        return Err(e);
    }
    report.installed = true;

    head(git, target, report)?;
    resolve_targets(git, target, report, Resolve::Checkout)?;
    checkout_steps(git, target, report)
}

fn remove_partial_clone(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => log::debug!("Removed partial clone {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial clone {}: {e}", path.display()),
    }
}

/// Bring an installed plugin's remote up to date and resolve its targets.
///
/// Nothing in the working tree changes; see [`checkout`].
pub fn fetch(git: &Git, target: &PluginTarget, offline: bool) -> PluginReport {
    let mut report = PluginReport::new(target);
    if let Err(e) = fetch_steps(git, target, &mut report, offline) {
        report.fail(e);
    }
    report
}

fn fetch_steps(
    git: &Git,
    target: &PluginTarget,
    report: &mut PluginReport,
    offline: bool,
) -> Result<()> {
    let path = Some(target.path.as_path());

    match &target.source {
        Some(source) => {
            let result = git.exec(
                &target.name,
                "set origin",
                path,
                git::set_url_args(source),
                &mut report.warnings,
            );
            if let Err(e) = result {
                log::warn!("{e}");
                report.warnings.push(e.to_string());
            }
        }
        None => {
            let url = git
                .exec(
                    &target.name,
                    "get origin",
                    path,
                    git::get_url_args(),
                    &mut report.warnings,
                )
                .map_err(|e| Error::RepoResolution {
                    plugin: target.name.clone(),
                    reason: e.to_string(),
                })?;
            report.source = Some(url);
        }
    }

    if !offline {
        git.exec(
            &target.name,
            "fetch",
            path,
            git::fetch_args(),
            &mut report.warnings,
        )?;
    }

    head(git, target, report)?;
    resolve_targets(git, target, report, Resolve::WithMonitor)
}

/// Resolve an explicit checkout target without touching the network.
///
/// Used to apply snapshots: `target.checkout` holds the wanted revision.
pub fn resolve(git: &Git, target: &PluginTarget) -> PluginReport {
    let mut report = PluginReport::new(target);
    let result =
        head(git, target, &mut report).and_then(|()| resolve_targets(git, target, &mut report, Resolve::Checkout));
    if let Err(e) = result {
        report.fail(e);
    }
    report
}

/// Stash local changes and check out the resolved target, if it moved.
///
/// Reports that already carry an error are returned untouched.
pub fn checkout(git: &Git, target: &PluginTarget, mut report: PluginReport) -> PluginReport {
    if !report.is_ok() {
        return report;
    }
    if let Err(e) = checkout_steps(git, target, &mut report) {
        report.fail(e);
    }
    report
}

fn checkout_steps(git: &Git, target: &PluginTarget, report: &mut PluginReport) -> Result<()> {
    if !report.needs_checkout() {
        return Ok(());
    }
    let Some(commit) = report.state.checkout_commit.clone() else {
        return Ok(());
    };
    let path = Some(target.path.as_path());

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    git.exec(
        &target.name,
        "stash",
        path,
        git::stash_args(&timestamp),
        &mut report.warnings,
    )?;
    git.exec(
        &target.name,
        "checkout",
        path,
        git::checkout_args(&commit),
        &mut report.warnings,
    )?;
    report.checked_out = true;
    Ok(())
}

/// Current commit of an installed plugin.
pub fn head_commit(git: &Git, target: &PluginTarget) -> Result<String> {
    let mut warnings = Vec::new();
    git.exec(
        &target.name,
        "rev-list HEAD",
        Some(target.path.as_path()),
        git::rev_list_args("HEAD"),
        &mut warnings,
    )
}

fn head(git: &Git, target: &PluginTarget, report: &mut PluginReport) -> Result<()> {
    let head = git.exec(
        &target.name,
        "rev-list HEAD",
        Some(target.path.as_path()),
        git::rev_list_args("HEAD"),
        &mut report.warnings,
    )?;
    report.state.head = Some(head);
    Ok(())
}

fn resolve_targets(
    git: &Git,
    target: &PluginTarget,
    report: &mut PluginReport,
    mode: Resolve,
) -> Result<()> {
    let path = Some(target.path.as_path());
    let with_monitor = mode == Resolve::WithMonitor;

    let needs_default = target.checkout.is_none() || (with_monitor && target.monitor.is_none());
    let default_branch = if needs_default {
        let out = git.exec(
            &target.name,
            "default branch",
            path,
            git::default_branch_args(),
            &mut report.warnings,
        )?;
        let branch = out.strip_prefix("origin/").unwrap_or(&out);
        (!branch.is_empty()).then(|| branch.to_string())
    } else {
        None
    };
    report.state.default_branch.clone_from(&default_branch);

    let checkout_ref = target.checkout.clone().or_else(|| default_branch.clone());
    if let Some(reference) = &checkout_ref {
        let commit = resolve_ref(git, target, reference, &mut report.warnings)?;
        report.state.checkout_commit = Some(commit);
    }
    report.state.checkout_ref = checkout_ref;

    if !with_monitor {
        return Ok(());
    }

    let monitor_ref = target.monitor.clone().or(default_branch);
    if let Some(reference) = &monitor_ref {
        let commit = resolve_ref(git, target, reference, &mut report.warnings)?;
        report.state.monitor_commit = Some(commit);
    }
    report.state.monitor_ref = monitor_ref;

    let state = &report.state;
    let checkout_log = match (&state.head, &state.checkout_commit) {
        (Some(head), Some(to)) if head != to => Some((head.clone(), to.clone())),
        _ => None,
    };
    let monitor_log = match (&state.checkout_commit, &state.monitor_commit) {
        (Some(from), Some(to)) if from != to => Some((from.clone(), to.clone())),
        _ => None,
    };

    if let Some((from, to)) = checkout_log {
        report.state.log_checkout =
            git.exec(&target.name, "log", path, git::log_args(&from, &to), &mut report.warnings)?;
    }
    if let Some((from, to)) = monitor_log {
        report.state.log_monitor =
            git.exec(&target.name, "log", path, git::log_args(&from, &to), &mut report.warnings)?;
    }
    Ok(())
}

/// Resolve a ref to a commit, preferring the remote branch of that name.
fn resolve_ref(
    git: &Git,
    target: &PluginTarget,
    reference: &str,
    warnings: &mut Vec<String>,
) -> Result<String> {
    let path = Some(target.path.as_path());
    let remote_ref = format!("origin/{reference}");

    let listed = git.exec(
        &target.name,
        "branch list",
        path,
        git::branch_list_args(&remote_ref),
        warnings,
    )?;
    let is_branch = listed.lines().any(|line| line.trim() == remote_ref);
    let rev = if is_branch { remote_ref.as_str() } else { reference };

    git.exec(
        &target.name,
        "rev-list",
        path,
        git::rev_list_args(rev),
        warnings,
    )
}
