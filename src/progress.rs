//! Terminal rendering of the engine's progress and message channels.
//!
//! One bar tracks handler slots across the whole run. A second line shows
//! the item the current handler is working on. Warnings are printed above
//! both as they arrive.

use crate::ui;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use provisioning::{Message, MessageCallback, ProgressCallback, ProgressEvent, SubStatus};
use std::sync::Mutex;

const MESSAGE_WIDTH: usize = 48;

pub struct TerminalProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    detail: ProgressBar,
    completed: Mutex<Vec<String>>,
}

impl TerminalProgress {
    /// Bars are hidden when `quiet` is set
    pub fn new(quiet: bool) -> Self {
        let multi = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(style(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ));

        let detail = multi.add(ProgressBar::new(0));
        detail.set_style(style("  {prefix:.dim} {msg}"));

        Self {
            multi,
            overall,
            detail,
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Clear the bars, returns the sequences reported as completed
    pub fn finish(&self) -> Vec<String> {
        self.detail.finish_and_clear();
        self.overall.finish_and_clear();
        self.completed
            .lock()
            .map(|completed| completed.clone())
            .unwrap_or_default()
    }

    /// Whether warnings are drawn as they arrive
    pub fn shows_warnings(&self) -> bool {
        !self.multi.is_hidden()
    }

    fn println(&self, line: &str) {
        if self.multi.println(line).is_err() {
            log::debug!("Could not draw above progress bars: {line}");
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        if self.overall.length() != Some(event.total as u64) {
            self.overall.set_length(event.total as u64);
        }
        self.overall.set_position(event.step as u64);
        if let Some(message) = &event.message {
            self.overall.set_message(ui::truncate(message, MESSAGE_WIDTH));
        }
    }
}

impl MessageCallback for TerminalProgress {
    fn on_message(&self, message: &Message) {
        match message {
            Message::Warning(text) => self.println(&ui::warning_line(text)),
            Message::Progress(status) => {
                let (prefix, text) = detail_line(status);
                self.detail.set_prefix(prefix);
                self.detail.set_message(ui::truncate(&text, MESSAGE_WIDTH));
            }
            Message::Completed(sequence) => {
                self.detail.set_prefix("");
                self.detail.set_message("");
                if let Ok(mut completed) = self.completed.lock() {
                    completed.push(sequence.clone());
                }
            }
        }
    }
}

/// Prefix and message for the detail line
fn detail_line(status: &SubStatus) -> (String, String) {
    match status {
        SubStatus::Determinate { current, total, .. } => (
            format!("[{current}/{total}]"),
            format!("{}: {}", status.activity(), status.status()),
        ),
        SubStatus::Indeterminate(text) => (String::new(), text.clone()),
    }
}
