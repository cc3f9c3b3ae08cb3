use anyhow::{Context as _, Result};
use colored::Colorize;
use dialoguer::Confirm;
use plugkit::{ActionKind, ConfirmCallback, Level, Notifier, PendingAction};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a message whose first line carries the status icon.
fn block(icon: &str, msg: &str, to_stderr: bool) {
    let mut lines = msg.lines();
    let first = lines.next().unwrap_or_default();
    let rest: Vec<String> = lines.map(|l| format!("  {}", l.dimmed())).collect();
    let text = if rest.is_empty() {
        format!("{icon} {first}")
    } else {
        format!("{icon} {first}\n{}", rest.join("\n"))
    };
    if to_stderr {
        eprintln!("{text}");
    } else {
        println!("{text}");
    }
}

/// Colored terminal sink for manager notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&mut self, message: &str, level: Level) {
        match level {
            Level::Info => block(&"ℹ".blue().to_string(), message, false),
            Level::Warn => block(&"⚠".yellow().to_string(), message, false),
            Level::Error => block(&"✗".red().to_string(), message, true),
        }
    }
}

/// Asks on the terminal before updates and deletions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, actions: &[PendingAction]) -> Result<bool> {
        header(&format!("{} pending change(s)", actions.len()));
        for action in actions {
            let label = match action.action {
                ActionKind::Install => action.action.as_str().green(),
                ActionKind::Update | ActionKind::Checkout => action.action.as_str().cyan(),
                ActionKind::Delete => action.action.as_str().red(),
            };
            println!("  {} {}", label.bold(), action.plugin);
            for line in action.summary.lines() {
                dim(line);
            }
        }
        println!();

        // Deleting is not undoable; updating is
        let destructive = actions.iter().any(|a| a.action == ActionKind::Delete);
        Confirm::new()
            .with_prompt("Continue?")
            .default(!destructive)
            .interact()
            .context("Failed to read confirmation")
    }
}
