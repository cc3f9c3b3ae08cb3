use anyhow::Result;

use crate::Context;
use crate::commands;

pub fn run(ctx: &Context) -> Result<()> {
    let mut manager = commands::declare(ctx)?;
    let summary = manager.install()?;
    commands::finish(ctx, "installed", &summary)
}
