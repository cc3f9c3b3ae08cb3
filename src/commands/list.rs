use anyhow::Result;
use colored::Colorize;
use plugkit::SessionEntry;

use crate::Context;
use crate::commands;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let manager = commands::declare(ctx)?;
    let session = manager.session();

    if session.is_empty() {
        ui::warn("No plugins declared");
        return Ok(());
    }

    ui::header(&format!("Plugins ({})", session.len()));
    for entry in session.iter() {
        print_entry(entry, ctx.verbose > 0);
    }
    Ok(())
}

fn print_entry(entry: &SessionEntry, verbose: bool) {
    let status = if entry.is_installed() {
        "●".green()
    } else {
        "○".dimmed()
    };
    let pin = entry
        .checkout
        .as_deref()
        .map(|c| format!(" @ {c}").cyan().to_string())
        .unwrap_or_default();
    println!("{status} {}{pin}", entry.name.bold());

    if let Some(source) = &entry.source {
        ui::dim(source);
    }
    if !entry.depends.is_empty() {
        ui::kv("depends", &entry.depends.join(", "));
    }
    if let Some(monitor) = &entry.monitor {
        ui::kv("monitor", monitor);
    }
    if verbose {
        ui::kv("path", &entry.path.display().to_string());
    }
}
