use anyhow::Result;
use plugkit::UpdateOptions;

use crate::Context;
use crate::commands;

pub fn run(ctx: &Context, names: &[String], offline: bool, force: bool) -> Result<()> {
    let mut manager = commands::declare(ctx)?;
    let summary = manager.update(names, UpdateOptions { force, offline })?;
    if !ctx.quiet && !summary.changed.is_empty() {
        crate::ui::dim(&format!(
            "Log: {}",
            manager.config().path.log.display()
        ));
    }
    commands::finish(ctx, "updated", &summary)
}
