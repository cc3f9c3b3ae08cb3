use anyhow::{Result, bail};
use plugkit::CleanOptions;

use crate::Context;
use crate::commands;
use crate::ui;

pub fn run(ctx: &Context, force: bool) -> Result<()> {
    let mut manager = commands::declare(ctx)?;
    let summary = manager.clean(CleanOptions { force })?;

    if summary.declined {
        ui::warn("Cancelled, nothing removed");
        return Ok(());
    }
    if !summary.failed.is_empty() {
        bail!("{} directory(ies) could not be removed", summary.failed.len());
    }
    if !ctx.quiet && !summary.removed.is_empty() {
        ui::success(&format!("Removed {} plugin(s)", summary.removed.len()));
    }
    Ok(())
}
