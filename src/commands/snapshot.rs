use anyhow::Result;

use crate::Context;
use crate::cli::SnapshotCommand;
use crate::commands;
use crate::ui;

pub fn run(ctx: &Context, cmd: SnapshotCommand) -> Result<()> {
    let mut manager = commands::declare(ctx)?;
    match cmd {
        SnapshotCommand::Save { path } => {
            let path = path.as_deref().map(crate::config::expand);
            manager.snap_save(path.as_deref())?;
            Ok(())
        }
        SnapshotCommand::Load { path } => {
            let path = path.as_deref().map(crate::config::expand);
            let summary = manager.snap_load(path.as_deref())?;
            commands::finish(ctx, "restored", &summary)
        }
        SnapshotCommand::Show => {
            let snapshot = manager.snap_get()?;
            if snapshot.is_empty() {
                ui::warn("No installed plugins");
                return Ok(());
            }
            ui::header("Snapshot");
            for (name, commit) in snapshot.iter() {
                ui::kv(name, commit);
            }
            Ok(())
        }
    }
}
