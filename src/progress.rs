//! Spinner shown while a batch of git jobs runs.

use indicatif::{ProgressBar, ProgressStyle};
use plugkit::ProgressCallback;
use std::time::Duration;

const DOTS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Spinner-backed progress; hidden when `quiet`.
pub struct Spinner {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }
}

impl ProgressCallback for Spinner {
    fn on_batch_start(&mut self, label: &str, count: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(DOTS)
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
        {
            bar.set_style(style);
        }
        bar.set_message(format!("{label} {count} plugin(s)"));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
