//! High-level plugin manager
//!
//! [`Manager`] owns the session and drives every batch operation:
//!
//! 1. `git version` once per batch (a missing git aborts before any job)
//! 2. pre hooks in session order
//! 3. per-plugin pipelines on the worker pool
//! 4. post hooks in session order, help tags
//! 5. queued notifications flushed in session order

use crate::clean::{self, Removal};
use crate::config::Config;
use crate::context::{
    ActionKind, AutoConfirm, ConfirmCallback, NoProgress, PendingAction, ProgressCallback,
};
use crate::error::{Error, Result};
use crate::git::Git;
use crate::helptags;
use crate::hooks::{self, HookKind};
use crate::notify::{Level, LogNotifier, Notifications, Notifier};
use crate::pipeline::{self, PluginReport, PluginTarget};
use crate::scheduler::{CommandRunner, ProcessRunner, run_bounded};
use crate::session::Session;
use crate::snapshot::Snapshot;
use crate::spec::PluginSpec;
use crate::types::{AddOptions, BatchSummary, CleanOptions, CleanSummary, UpdateOptions};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owns the session and the collaborators used by batch operations.
pub struct Manager {
    config: Config,
    session: Session,
    runner: Arc<dyn CommandRunner>,
    notifier: Box<dyn Notifier>,
    confirm: Box<dyn ConfirmCallback>,
    progress: Box<dyn ProgressCallback>,
}

impl Manager {
    /// Manager spawning real git processes, confirming everything and
    /// notifying through `log`.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: Session::new(),
            runner: Arc::new(ProcessRunner),
            notifier: Box::new(LogNotifier),
            confirm: Box::new(AutoConfirm),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_confirm(mut self, confirm: impl ConfirmCallback + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressCallback + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Re-initialize with a new config. The session is cleared.
    pub fn setup(&mut self, config: Config) {
        self.config = config;
        self.session.clear();
    }

    /// Declare a plugin and its dependencies.
    pub fn add(&mut self, spec: impl Into<PluginSpec>, opts: AddOptions) -> Result<BatchSummary> {
        let layout = self.config.layout();
        let touched = self.session.add(spec.into(), &layout)?;
        log::debug!("Registered {} plugin(s)", touched.len());

        if !opts.install_missing {
            return Ok(BatchSummary::default());
        }
        let missing = self.missing(&touched);
        self.install_indices(missing)
    }

    /// Install every session plugin that is not on disk yet.
    pub fn install(&mut self) -> Result<BatchSummary> {
        let all: Vec<usize> = (0..self.session.len()).collect();
        let missing = self.missing(&all);
        self.install_indices(missing)
    }

    fn missing(&self, indices: &[usize]) -> Vec<usize> {
        let mut missing: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| self.session.get(i).is_some_and(|e| !e.is_installed()))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    fn install_indices(&mut self, indices: Vec<usize>) -> Result<BatchSummary> {
        if indices.is_empty() {
            return Ok(BatchSummary::default());
        }
        let git = self.git()?;
        let mut messages = BatchMessages::default();

        messages.hook_errors(hooks::run_in_session_order(
            &self.session,
            &indices,
            HookKind::PreInstall,
        ));

        let targets = self.targets(&indices);
        self.progress.on_batch_start("Installing", targets.len());
        let reports = run_bounded(targets, self.config.n_threads(), |target| {
            pipeline::install(&git, &target)
        })?;
        self.progress.on_batch_complete();

        let installed: Vec<usize> = reports
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.index)
            .collect();
        messages.hook_errors(hooks::run_in_session_order(
            &self.session,
            &installed,
            HookKind::PostInstall,
        ));

        for report in &reports {
            messages.report(report);
            if report.is_ok() {
                messages.push(report.index, Level::Info, format!("Installed `{}`", report.name));
            }
        }
        refresh_help_tags(&reports, &mut messages);

        let summary = summarize(&reports);
        log::info!(
            "Install finished: {} installed, {} failed",
            summary.changed.len(),
            summary.failed.len()
        );
        messages.flush(self.notifier.as_mut(), self.config.silent);
        Ok(summary)
    }

    /// Fetch and check out new revisions.
    ///
    /// `names` selects plugins; empty means the whole session.
    pub fn update(&mut self, names: &[String], opts: UpdateOptions) -> Result<BatchSummary> {
        let indices = self.select(names)?;
        let git = self.git()?;
        let mut messages = BatchMessages::default();

        let mut selected = Vec::with_capacity(indices.len());
        for index in indices {
            match self.session.get(index) {
                Some(entry) if entry.is_installed() => selected.push(index),
                Some(entry) => messages.push(
                    index,
                    Level::Warn,
                    format!("`{}` is not installed, skipping update", entry.name),
                ),
                None => {}
            }
        }

        let targets = self.targets(&selected);
        self.progress.on_batch_start("Fetching", targets.len());
        let offline = opts.offline;
        let reports = run_bounded(targets, self.config.n_threads(), |target| {
            pipeline::fetch(&git, &target, offline)
        })?;
        self.progress.on_batch_complete();

        for report in &reports {
            messages.report(report);
            if report.is_ok() && report.has_monitor_changes() {
                messages.push(
                    report.index,
                    Level::Info,
                    format!(
                        "`{}` has new commits on `{}`",
                        report.name,
                        report.state.monitor_ref.as_deref().unwrap_or("?")
                    ),
                );
            }
        }

        let actions: Vec<PendingAction> = reports
            .iter()
            .filter(|r| r.is_ok() && r.needs_checkout())
            .map(|r| PendingAction::new(&r.name, ActionKind::Update, r.summary()))
            .collect();

        if actions.is_empty() {
            messages.general(Level::Info, "Nothing to update");
            // Monitor-only changes are still logged
            if let Err(e) = self.append_update_log(&reports) {
                messages.general(Level::Error, format!("Could not write update log: {e}"));
            }
            let summary = summarize(&reports);
            messages.flush(self.notifier.as_mut(), self.config.silent);
            return Ok(summary);
        }

        if !opts.force && !self.ask(&actions)? {
            messages.general(Level::Info, "Update canceled");
            let mut summary = summarize(&reports);
            summary.declined = true;
            messages.flush(self.notifier.as_mut(), self.config.silent);
            return Ok(summary);
        }

        let reports = self.checkout_phase(&git, reports, &mut messages)?;
        for report in reports.iter().filter(|r| r.checked_out) {
            messages.push(report.index, Level::Info, format!("Updated `{}`", report.name));
        }
        if let Err(e) = self.append_update_log(&reports) {
            messages.general(Level::Error, format!("Could not write update log: {e}"));
        }

        let summary = summarize(&reports);
        log::info!(
            "Update finished: {} updated, {} unchanged, {} failed",
            summary.changed.len(),
            summary.unchanged.len(),
            summary.failed.len()
        );
        messages.flush(self.notifier.as_mut(), self.config.silent);
        Ok(summary)
    }

    /// Remove installed directories no session plugin points at.
    pub fn clean(&mut self, opts: CleanOptions) -> Result<CleanSummary> {
        let layout = self.config.layout();
        let installed = layout.installed_paths()?;
        let managed: Vec<&Path> = self.session.iter().map(|e| e.path.as_path()).collect();
        let orphans = clean::find_orphans(&installed, &managed);

        let mut notes = Notifications::new();
        let mut summary = CleanSummary {
            orphans: orphans.clone(),
            ..Default::default()
        };

        if orphans.is_empty() {
            notes.info("Nothing to clean");
            notes.flush(self.notifier.as_mut(), self.config.silent);
            return Ok(summary);
        }

        let actions: Vec<PendingAction> = orphans
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                PendingAction::new(name, ActionKind::Delete, path.display().to_string())
            })
            .collect();

        if !opts.force && !self.ask(&actions)? {
            summary.declined = true;
            notes.info("Clean canceled");
            notes.flush(self.notifier.as_mut(), self.config.silent);
            return Ok(summary);
        }

        let removal = match &self.config.path.trash {
            Some(trash) => {
                let batch = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
                Removal::Trash(trash.join(batch))
            }
            None => Removal::Delete,
        };

        for path in orphans {
            match clean::remove(&path, &removal) {
                Ok(Some(dest)) => {
                    notes.info(format!("Moved {} to {}", path.display(), dest.display()));
                    summary.removed.push(path);
                }
                Ok(None) => {
                    notes.info(format!("Deleted {}", path.display()));
                    summary.removed.push(path);
                }
                Err(e) => {
                    notes.error(format!("Could not remove {}: {e}", path.display()));
                    summary.failed.push(path);
                }
            }
        }

        log::info!("Clean finished: {} removed", summary.removed.len());
        notes.flush(self.notifier.as_mut(), self.config.silent);
        Ok(summary)
    }

    /// Current commit of every installed session plugin.
    ///
    /// Plugins whose commit cannot be read are left out.
    pub fn snap_get(&mut self) -> Result<Snapshot> {
        let git = self.git()?;
        let installed: Vec<usize> = (0..self.session.len())
            .filter(|&i| self.session.get(i).is_some_and(|e| e.is_installed()))
            .collect();
        let targets = self.targets(&installed);

        let results = run_bounded(targets, self.config.n_threads(), |target| {
            let head = pipeline::head_commit(&git, &target);
            (target.index, target.name, head)
        })?;

        let mut messages = BatchMessages::default();
        let mut snapshot = Snapshot::new();
        for (index, name, head) in results {
            match head {
                Ok(commit) => snapshot.insert(name, commit),
                Err(e) => messages.push(index, Level::Warn, format!("Not in snapshot: {e}")),
            }
        }
        messages.flush(self.notifier.as_mut(), self.config.silent);
        Ok(snapshot)
    }

    /// Check out the snapshot's commit for every session plugin it names.
    ///
    /// Offline and without confirmation. Declared checkouts are unchanged.
    pub fn snap_set(&mut self, snapshot: &Snapshot) -> Result<BatchSummary> {
        let git = self.git()?;
        let mut messages = BatchMessages::default();

        let targets: Vec<PluginTarget> = self
            .session
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_installed())
            .filter_map(|(index, entry)| {
                let commit = snapshot.get(&entry.name)?;
                Some(PluginTarget::from_entry(index, entry).with_checkout(commit))
            })
            .collect();

        self.progress.on_batch_start("Resolving", targets.len());
        let reports = run_bounded(targets, self.config.n_threads(), |target| {
            pipeline::resolve(&git, &target)
        })?;
        self.progress.on_batch_complete();

        for report in &reports {
            messages.report(report);
        }
        let reports = self.checkout_phase(&git, reports, &mut messages)?;
        for report in reports.iter().filter(|r| r.checked_out) {
            messages.push(
                report.index,
                Level::Info,
                format!("Checked out snapshot state of `{}`", report.name),
            );
        }

        let summary = summarize(&reports);
        messages.flush(self.notifier.as_mut(), self.config.silent);
        Ok(summary)
    }

    /// Save the current snapshot, by default to the configured path.
    pub fn snap_save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let snapshot = self.snap_get()?;
        let path = path.map_or_else(|| self.config.path.snapshot.clone(), Path::to_path_buf);
        snapshot.save(&path)?;
        if !self.config.silent {
            self.notifier
                .notify(&format!("Snapshot saved to {}", path.display()), Level::Info);
        }
        Ok(path)
    }

    /// Load a snapshot, by default from the configured path, and apply it.
    pub fn snap_load(&mut self, path: Option<&Path>) -> Result<BatchSummary> {
        let path = path.map_or_else(|| self.config.path.snapshot.clone(), Path::to_path_buf);
        let snapshot = Snapshot::load(&path)?;
        self.snap_set(&snapshot)
    }

    fn git(&self) -> Result<Git> {
        Git::detect(Arc::clone(&self.runner), self.config.timeout())
    }

    fn targets(&self, indices: &[usize]) -> Vec<PluginTarget> {
        indices
            .iter()
            .filter_map(|&i| self.session.get(i).map(|e| PluginTarget::from_entry(i, e)))
            .collect()
    }

    fn select(&self, names: &[String]) -> Result<Vec<usize>> {
        if names.is_empty() {
            return Ok((0..self.session.len()).collect());
        }
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let index = self.session.position(name).ok_or_else(|| {
                Error::invalid_spec("names", format!("contains unknown plugin '{name}'"))
            })?;
            indices.push(index);
        }
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    fn ask(&mut self, actions: &[PendingAction]) -> Result<bool> {
        self.confirm
            .confirm(actions)
            .map_err(|e| Error::Other(format!("confirmation failed: {e:#}")))
    }

    /// pre_checkout hooks, parallel stash + checkout, post_checkout hooks
    /// and help tags. Returns every report in session order.
    fn checkout_phase(
        &mut self,
        git: &Git,
        reports: Vec<PluginReport>,
        messages: &mut BatchMessages,
    ) -> Result<Vec<PluginReport>> {
        let (pending, mut done): (Vec<_>, Vec<_>) = reports
            .into_iter()
            .partition(|r| r.is_ok() && r.needs_checkout());

        let indices: Vec<usize> = pending.iter().map(|r| r.index).collect();
        messages.hook_errors(hooks::run_in_session_order(
            &self.session,
            &indices,
            HookKind::PreCheckout,
        ));

        let work: Vec<(PluginTarget, PluginReport)> = pending
            .into_iter()
            .filter_map(|report| {
                let entry = self.session.get(report.index)?;
                Some((PluginTarget::from_entry(report.index, entry), report))
            })
            .collect();

        self.progress.on_batch_start("Checking out", work.len());
        let checked = run_bounded(work, self.config.n_threads(), |(target, report)| {
            pipeline::checkout(git, &target, report)
        })?;
        self.progress.on_batch_complete();

        let moved: Vec<usize> = checked
            .iter()
            .filter(|r| r.checked_out)
            .map(|r| r.index)
            .collect();
        messages.hook_errors(hooks::run_in_session_order(
            &self.session,
            &moved,
            HookKind::PostCheckout,
        ));

        for report in checked.iter().filter(|r| !r.is_ok()) {
            messages.report(report);
        }
        refresh_help_tags(&checked, messages);

        done.extend(checked);
        done.sort_by_key(|r| r.index);
        Ok(done)
    }

    fn append_update_log(&self, reports: &[PluginReport]) -> std::io::Result<()> {
        let blocks: Vec<String> = reports
            .iter()
            .filter(|r| r.is_ok() && (r.checked_out || r.has_monitor_changes()))
            .map(PluginReport::log_block)
            .collect();
        if blocks.is_empty() {
            return Ok(());
        }

        let path = &self.config.path.log;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "========== Update {now} ==========")?;
        write!(file, "{}", blocks.join("\n"))?;
        writeln!(file)?;
        Ok(())
    }
}

/// Regenerate help tags for plugins whose tree changed.
fn refresh_help_tags(reports: &[PluginReport], messages: &mut BatchMessages) {
    for report in reports
        .iter()
        .filter(|r| r.is_ok() && (r.installed || r.checked_out))
    {
        if let Err(e) = helptags::generate(&report.path) {
            messages.push(
                report.index,
                Level::Warn,
                format!("Could not generate help tags for `{}`: {e}", report.name),
            );
        }
    }
}

fn summarize(reports: &[PluginReport]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for report in reports {
        if !report.is_ok() {
            summary.failed.push(report.name.clone());
        } else if report.installed || report.checked_out {
            summary.changed.push(report.name.clone());
        } else {
            summary.unchanged.push(report.name.clone());
        }
    }
    summary
}

/// Notifications of one batch, grouped by session index.
#[derive(Default)]
struct BatchMessages {
    by_plugin: BTreeMap<usize, Vec<(Level, String)>>,
    general: Vec<(Level, String)>,
}

impl BatchMessages {
    fn push(&mut self, index: usize, level: Level, message: impl Into<String>) {
        self.by_plugin
            .entry(index)
            .or_default()
            .push((level, message.into()));
    }

    fn general(&mut self, level: Level, message: impl Into<String>) {
        self.general.push((level, message.into()));
    }

    fn report(&mut self, report: &PluginReport) {
        for warning in &report.warnings {
            self.push(report.index, Level::Warn, format!("`{}`: {warning}", report.name));
        }
        if let Some(error) = &report.error {
            self.push(report.index, Level::Error, error.to_string());
        }
    }

    fn hook_errors(&mut self, errors: Vec<(usize, Error)>) {
        for (index, error) in errors {
            self.push(index, Level::Error, error.to_string());
        }
    }

    fn flush(self, notifier: &mut dyn Notifier, silent: bool) {
        let mut notes = Notifications::new();
        for (level, message) in self.by_plugin.into_values().flatten().chain(self.general) {
            notes.push(level, message);
        }
        notes.flush(notifier, silent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AutoDecline;
    use crate::hooks::{Hook, HookContext};
    use crate::notify::MemoryNotifier;
    use crate::testutil::ScriptedRunner;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        runner: Arc<ScriptedRunner>,
        notes: MemoryNotifier,
        manager: Manager,
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.path.package = dir.join("site");
        config.path.snapshot = dir.join("snapshot.toml");
        config.path.log = dir.join("update.log");
        config.job.n_threads = Some(4);
        config
    }

    fn fixture(runner: ScriptedRunner) -> Fixture {
        fixture_with(runner, |_| {})
    }

    fn fixture_with(runner: ScriptedRunner, tweak: impl FnOnce(&mut Config)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        tweak(&mut config);
        let runner = Arc::new(runner);
        let notes = MemoryNotifier::new();
        let manager = Manager::new(config)
            .with_runner(runner.clone())
            .with_notifier(notes.clone());
        Fixture {
            dir,
            runner,
            notes,
            manager,
        }
    }

    impl Fixture {
        /// Create the install directory so the plugin counts as installed.
        fn installed(&mut self, spec: PluginSpec) {
            let name = spec.resolved_name().unwrap();
            fs::create_dir_all(self.manager.config().layout().opt_dir().join(name)).unwrap();
            self.manager.add(spec, AddOptions::default()).unwrap();
        }

        fn decline(&mut self) {
            let manager = std::mem::replace(&mut self.manager, Manager::new(Config::default()));
            self.manager = manager.with_confirm(AutoDecline);
        }
    }

    #[test]
    fn test_update_checks_out_tag_that_is_not_a_branch() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("origin/hello", "")
                .respond("rev-list -1 hello", "bbbb")
                .respond("aaaa...bbbb", "> bbbb | 2024-01-01 | me (tag: hello)\n  Hello"),
        );
        fx.installed(PluginSpec::from_source("user/foo").with_checkout("hello"));

        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert_eq!(summary.changed, vec!["foo"]);
        assert_eq!(fx.runner.count("stash --quiet"), 1);
        assert_eq!(fx.runner.count("checkout --quiet bbbb"), 1);

        let log = fs::read_to_string(fx.dir.path().join("update.log")).unwrap();
        assert!(log.starts_with("========== Update "));
        assert!(log.contains("+++ foo +++"));
        assert!(log.contains("State after:  bbbb (hello)"));
        assert_eq!(fx.notes.at(Level::Info), vec!["Updated `foo`"]);
    }

    #[test]
    fn test_monitor_only_changes_are_logged() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 v1", "aaaa")
                .respond("rev-list -1 origin/main", "cccc")
                .respond("short) origin/main", "origin/main")
                .respond("aaaa...cccc", "> cccc | 2024-01-02 | me\n  Upstream work"),
        );
        fx.installed(
            PluginSpec::from_source("user/foo")
                .with_checkout("v1")
                .with_monitor("main"),
        );

        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert_eq!(summary.unchanged, vec!["foo"]);
        assert_eq!(fx.runner.count("checkout --quiet"), 0);
        let log = fs::read_to_string(fx.dir.path().join("update.log")).unwrap();
        assert!(log.contains("+++ foo +++"), "{log}");
        assert!(log.contains("Upstream work"), "{log}");
    }

    #[test]
    fn test_nothing_to_update_writes_no_log() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 v1", "aaaa"),
        );
        fx.installed(
            PluginSpec::from_source("user/foo")
                .with_checkout("v1")
                .with_monitor("v1"),
        );

        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert_eq!(summary.unchanged, vec!["foo"]);
        assert!(!fx.dir.path().join("update.log").exists());
    }

    #[test]
    fn test_declined_update_changes_nothing() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 v2", "bbbb"),
        );
        fx.decline();
        fx.installed(PluginSpec::from_source("user/foo").with_checkout("v2"));

        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert!(summary.declined);
        assert_eq!(fx.runner.count("checkout --quiet"), 0);
        assert_eq!(fx.runner.count("stash"), 0);
        assert!(!fx.dir.path().join("update.log").exists());
    }

    #[test]
    fn test_force_skips_confirmation() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 v2", "bbbb"),
        );
        fx.decline();
        fx.installed(PluginSpec::from_source("user/foo").with_checkout("v2"));

        let opts = UpdateOptions {
            force: true,
            offline: true,
        };
        let summary = fx.manager.update(&[], opts).unwrap();

        assert!(!summary.declined);
        assert_eq!(summary.changed, vec!["foo"]);
        assert_eq!(fx.runner.count("fetch"), 0);
    }

    #[test]
    fn test_set_origin_warning_and_head_error_are_isolated() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .fail("opt/a remote set-url", 2, "error: could not set url")
                .fail("opt/b rev-list -1 HEAD", 128, "fatal: not a git repository")
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 main", "aaaa"),
        );
        fx.installed(PluginSpec::from_source("user/a").with_checkout("main"));
        fx.installed(PluginSpec::from_source("user/b").with_checkout("main"));

        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert_eq!(summary.unchanged, vec!["a"]);
        assert_eq!(summary.failed, vec!["b"]);

        let warnings = fx.notes.at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("set origin"));
        let errors = fx.notes.at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("rev-list HEAD"));
        assert_eq!(fx.runner.count("opt/b rev-parse"), 0);
    }

    #[test]
    fn test_timeout_fails_only_its_plugin() {
        let mut fx = fixture_with(
            ScriptedRunner::new()
                .delay("opt/slow fetch", Duration::from_secs(2))
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 main", "aaaa"),
            |config| config.job.timeout_ms = 100,
        );
        fx.installed(PluginSpec::from_source("user/slow").with_checkout("main"));
        fx.installed(PluginSpec::from_source("user/fast").with_checkout("main"));

        let start = Instant::now();
        let summary = fx.manager.update(&[], UpdateOptions::default()).unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.failed, vec!["slow"]);
        assert_eq!(summary.unchanged, vec!["fast"]);
        let errors = fx.notes.at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("TIMEOUT"));
    }

    #[test]
    fn test_missing_git_aborts_before_any_job() {
        let mut fx = fixture(ScriptedRunner::new().fail("version", 127, "not found"));
        fx.installed(PluginSpec::from_source("user/foo"));

        let err = fx.manager.update(&[], UpdateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingExecutable { .. }));
        assert_eq!(fx.runner.calls().len(), 1);
    }

    #[test]
    fn test_unknown_update_name() {
        let mut fx = fixture(ScriptedRunner::new());
        fx.installed(PluginSpec::from_source("user/foo"));

        let err = fx
            .manager
            .update(&["nope".to_string()], UpdateOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { field: "names", .. }));
        assert!(fx.runner.calls().is_empty());
    }

    fn recording_hook(log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Hook {
        let log = Arc::clone(log);
        Arc::new(move |ctx: &HookContext| {
            log.lock().unwrap().push(ctx.name.clone());
            if fail {
                anyhow::bail!("hook exploded");
            }
            Ok(())
        })
    }

    #[test]
    fn test_install_hooks_follow_session_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut fx = fixture(
            ScriptedRunner::new()
                .delay("opt/first", Duration::from_millis(150))
                .delay("opt/second", Duration::from_millis(75)),
        );

        for (name, fail) in [("first", false), ("second", true), ("third", false)] {
            let spec = PluginSpec::from_source(format!("user/{name}"))
                .with_hook(HookKind::PreInstall, recording_hook(&log, false))
                .with_hook(HookKind::PostInstall, recording_hook(&log, fail));
            fx.manager.add(spec, AddOptions::default()).unwrap();
        }

        let summary = fx.manager.install().unwrap();

        assert_eq!(summary.changed, vec!["first", "second", "third"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "second", "third", "first", "second", "third"]
        );
        let errors = fx.notes.at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("post_install"));
        assert!(errors[0].contains("second"));
        assert_eq!(fx.runner.count(" clone "), 3);
    }

    #[test]
    fn test_add_installs_only_touched_missing_plugins() {
        let mut fx = fixture(ScriptedRunner::new());
        fx.installed(PluginSpec::from_source("user/present"));
        fx.manager
            .add(PluginSpec::from_source("user/other"), AddOptions::default())
            .unwrap();

        let opts = AddOptions {
            install_missing: true,
        };
        let spec = PluginSpec::from_source("user/app").with_dependency("user/present");
        let summary = fx.manager.add(spec, opts).unwrap();

        assert_eq!(summary.changed, vec!["app"]);
        assert_eq!(fx.runner.count(" clone "), 1);
        assert_eq!(fx.runner.count("https://github.com/user/other"), 0);
    }

    #[test]
    fn test_snap_get_then_set_does_not_checkout() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("opt/a rev-list -1 HEAD", "aaaa")
                .respond("opt/b rev-list -1 HEAD", "bbbb")
                .respond("rev-list -1 aaaa", "aaaa")
                .respond("rev-list -1 bbbb", "bbbb"),
        );
        fx.installed(PluginSpec::from_source("user/a"));
        fx.installed(PluginSpec::from_source("user/b"));

        let snapshot = fx.manager.snap_get().unwrap();
        assert_eq!(snapshot.get("a"), Some("aaaa"));
        assert_eq!(snapshot.get("b"), Some("bbbb"));

        let summary = fx.manager.snap_set(&snapshot).unwrap();
        assert_eq!(summary.unchanged, vec!["a", "b"]);
        assert_eq!(fx.runner.count("stash"), 0);
        assert_eq!(fx.runner.count("checkout --quiet"), 0);
        assert_eq!(fx.runner.count("fetch"), 0);
    }

    #[test]
    fn test_snap_set_checks_out_and_keeps_declared_checkout() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 cccc", "cccc"),
        );
        fx.installed(PluginSpec::from_source("user/a").with_checkout("main"));

        let mut snapshot = Snapshot::new();
        snapshot.insert("a", "cccc");
        snapshot.insert("not-in-session", "dddd");

        let summary = fx.manager.snap_set(&snapshot).unwrap();
        assert_eq!(summary.changed, vec!["a"]);
        assert_eq!(fx.runner.count("checkout --quiet cccc"), 1);
        assert_eq!(fx.runner.count("dddd"), 0);
        assert_eq!(
            fx.manager.session().find("a").unwrap().checkout.as_deref(),
            Some("main")
        );
    }

    #[test]
    fn test_snap_get_omits_failing_plugins() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .fail("opt/bad rev-list", 128, "fatal: bad")
                .respond("rev-list -1 HEAD", "aaaa"),
        );
        fx.installed(PluginSpec::from_source("user/good"));
        fx.installed(PluginSpec::from_source("user/bad"));
        fx.manager
            .add(PluginSpec::from_source("user/absent"), AddOptions::default())
            .unwrap();

        let snapshot = fx.manager.snap_get().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("good"), Some("aaaa"));
    }

    #[test]
    fn test_snap_save_and_load() {
        let mut fx = fixture(
            ScriptedRunner::new()
                .respond("rev-list -1 HEAD", "aaaa")
                .respond("rev-list -1 aaaa", "aaaa"),
        );
        fx.installed(PluginSpec::from_source("user/a"));

        let path = fx.manager.snap_save(None).unwrap();
        assert_eq!(path, fx.dir.path().join("snapshot.toml"));
        let saved = Snapshot::load(&path).unwrap();
        assert_eq!(saved, fx.manager.snap_get().unwrap());

        let summary = fx.manager.snap_load(None).unwrap();
        assert_eq!(summary.unchanged, vec!["a"]);
    }

    #[test]
    fn test_clean_removes_only_exact_orphans() {
        let mut fx = fixture(ScriptedRunner::new());
        fx.installed(PluginSpec::from_source("user/foo"));
        let layout = fx.manager.config().layout();
        fs::create_dir_all(layout.opt_dir().join("foo-extra")).unwrap();
        fs::create_dir_all(layout.start_dir().join("fo")).unwrap();

        let summary = fx.manager.clean(CleanOptions::default()).unwrap();

        assert_eq!(summary.removed.len(), 2);
        assert!(layout.opt_dir().join("foo").exists());
        assert!(!layout.opt_dir().join("foo-extra").exists());
        assert!(!layout.start_dir().join("fo").exists());
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_clean_declined_keeps_orphans() {
        let mut fx = fixture(ScriptedRunner::new());
        fx.decline();
        let layout = fx.manager.config().layout();
        fs::create_dir_all(layout.opt_dir().join("orphan")).unwrap();

        let summary = fx.manager.clean(CleanOptions::default()).unwrap();
        assert!(summary.declined);
        assert!(layout.opt_dir().join("orphan").exists());
    }

    #[test]
    fn test_clean_moves_to_trash() {
        let mut fx = fixture(ScriptedRunner::new());
        let trash = fx.dir.path().join("trash");
        let mut config = fx.manager.config().clone();
        config.path.trash = Some(trash.clone());
        fx.manager.setup(config);

        let orphan = fx.manager.config().layout().opt_dir().join("orphan");
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join("README"), "hi").unwrap();

        let opts = CleanOptions { force: true };
        let summary = fx.manager.clean(opts).unwrap();

        assert_eq!(summary.removed, vec![orphan.clone()]);
        assert!(!orphan.exists());
        let batches: Vec<_> = fs::read_dir(&trash).unwrap().collect();
        assert_eq!(batches.len(), 1);
        let moved = batches[0].as_ref().unwrap().path().join("opt/orphan/README");
        assert_eq!(fs::read_to_string(moved).unwrap(), "hi");
    }

    #[test]
    fn test_setup_clears_session() {
        let mut fx = fixture(ScriptedRunner::new());
        fx.manager
            .add(PluginSpec::from_source("user/foo"), AddOptions::default())
            .unwrap();
        assert_eq!(fx.manager.session().len(), 1);

        let config = fx.manager.config().clone();
        fx.manager.setup(config);
        assert!(fx.manager.session().is_empty());
    }

    #[test]
    fn test_silent_suppresses_info() {
        let mut fx = fixture_with(ScriptedRunner::new(), |config| config.silent = true);
        fx.manager.clean(CleanOptions::default()).unwrap();
        assert!(fx.notes.messages().is_empty());
    }
}
