//! Spinners shown while a host command runs.

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Start a spinner with `msg`.
///
/// Hidden when stdout is not a terminal, so piped output stays clean.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Replace the spinner with a skipped line.
pub fn finish_skipped(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "-".dimmed(), msg.dimmed());
}

/// Remove the spinner without a trace.
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
