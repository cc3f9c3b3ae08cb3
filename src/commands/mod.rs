pub mod clean;
pub mod install;
pub mod list;
pub mod snapshot;
pub mod update;

use anyhow::{Result, bail};
use plugkit::{AddOptions, BatchSummary, Config, ConfigOverride, Manager};

use crate::Context;
use crate::config::PluginsFile;
use crate::progress::Spinner;
use crate::ui::{self, PromptConfirm, TerminalNotifier};

/// Build a manager from the plugin file and declare every plugin in it.
///
/// Nothing is installed here.
pub(crate) fn declare(ctx: &Context) -> Result<Manager> {
    let file = PluginsFile::load(ctx.file.as_deref())?;
    let explicit = ctx.quiet.then(|| ConfigOverride {
        silent: Some(true),
        ..Default::default()
    });
    let config = Config::merged(Config::default(), Some(&file.settings), explicit.as_ref());
    log::debug!("Package root: {}", config.path.package.display());

    let mut manager = Manager::new(config)
        .with_notifier(TerminalNotifier)
        .with_confirm(PromptConfirm)
        .with_progress(Spinner::new(ctx.quiet));
    for spec in file.specs() {
        manager.add(spec, AddOptions::default())?;
    }
    Ok(manager)
}

/// Turn a batch outcome into the final line and the exit status.
pub(crate) fn finish(ctx: &Context, verb: &str, summary: &BatchSummary) -> Result<()> {
    if summary.declined {
        ui::warn("Cancelled, nothing changed");
        return Ok(());
    }
    if !summary.is_success() {
        bail!(
            "{} plugin(s) failed: {}",
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }
    if !ctx.quiet {
        if summary.changed.is_empty() {
            ui::success("Everything up to date");
        } else {
            ui::success(&format!("{} plugin(s) {verb}", summary.changed.len()));
        }
    }
    Ok(())
}
