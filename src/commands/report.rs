//! Terminal rendering of fleet progress.

use std::collections::BTreeSet;

use aptsync::{HostConfig, Phase, PhaseOutcome, SyncReporter};
use colored::Colorize;
use indicatif::ProgressBar;

use crate::progress;
use crate::ui;

/// Prints fleet events as they happen
pub struct TerminalReporter {
    /// Cut package lists at this many characters; `None` shows them whole
    list_limit: Option<usize>,
    /// Also print output of commands that succeed quietly
    verbose: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter {
    pub fn new(list_limit: Option<usize>, verbose: bool) -> Self {
        Self {
            list_limit,
            verbose,
            spinner: None,
        }
    }

    fn stop_spinner(&mut self) -> Option<ProgressBar> {
        self.spinner.take()
    }
}

/// `<subcommand> (<transition>): pkg, pkg, ...` for a phase header
pub fn phase_line(phase: Phase, packages: Option<&BTreeSet<String>>, limit: Option<usize>) -> String {
    let mut line = format!("{} ({})", phase.subcommand(), phase.description());
    if let Some(packages) = packages {
        let names: Vec<&str> = packages.iter().map(String::as_str).collect();
        line.push_str(": ");
        if names.is_empty() {
            line.push_str("none");
        } else {
            line.push_str(&ui::truncated_list(&names, limit));
        }
    }
    line
}

impl SyncReporter for TerminalReporter {
    fn on_host_start(&mut self, host: &HostConfig, _position: usize, _total: usize) {
        ui::host_banner(&host.display_name());
    }

    fn on_state_fetched(&mut self, _host: &str, distribution: &str, packages: usize) {
        let distribution = if distribution.is_empty() {
            "unknown"
        } else {
            distribution
        };
        ui::kv("Operating system", distribution);
        ui::kv("Packages listed", &packages.to_string());
    }

    fn on_reference_captured(&mut self, _host: &str) {
        ui::info(&"This host is the reference, capturing its package list.".blue().to_string());
    }

    fn on_duplicate_reference(&mut self, previous: &str, host: &str) {
        ui::warn(&format!(
            "{host} is also marked as reference and replaces {previous}; mark only one host"
        ));
    }

    fn on_no_reference(&mut self, _host: &str) {
        ui::info(&"No reference package list to synchronize to yet.".blue().to_string());
    }

    fn on_distribution_mismatch(&mut self, _host: &str, reference: &str, replica: &str) {
        ui::warn(&format!(
            "Operating system differs from the reference ({replica} vs {reference})"
        ));
    }

    fn on_phase_start(&mut self, _host: &str, phase: Phase, packages: Option<&BTreeSet<String>>) {
        ui::step(
            phase.position(),
            Phase::ALL.len(),
            &phase_line(phase, packages, self.list_limit),
        );
        self.spinner = Some(progress::spinner(&format!("{}...", phase.subcommand())));
    }

    fn on_phase_complete(&mut self, _host: &str, phase: Phase, outcome: &PhaseOutcome) {
        let spinner = self.stop_spinner();
        match outcome {
            PhaseOutcome::Applied { output } => {
                if let Some(pb) = &spinner {
                    progress::finish_clear(pb);
                }
                let show_output = self.verbose || !phase.is_maintenance();
                if show_output && !output.is_empty() {
                    println!("{output}");
                }
                ui::success("[OK]");
            }
            PhaseOutcome::Skipped { reason } => match &spinner {
                Some(pb) => progress::finish_skipped(pb, reason),
                None => ui::dim(reason),
            },
            PhaseOutcome::Failed { error } => {
                if let Some(pb) = &spinner {
                    progress::finish_clear(pb);
                }
                ui::error(&error.to_string());
            }
        }
    }

    fn on_host_output(&mut self, _host: &str, output: &str) {
        if !output.is_empty() {
            println!("{output}");
        }
        ui::success("[OK]");
    }

    fn on_host_failed(&mut self, _host: &str, error: &hostexec::Error) {
        if let Some(pb) = self.stop_spinner() {
            progress::finish_clear(&pb);
        }
        ui::error(&error.to_string());
    }

    fn on_interrupted(&mut self, host: &str) {
        if let Some(pb) = self.stop_spinner() {
            progress::finish_clear(&pb);
        }
        log::warn!("Run interrupted while processing {host}");
    }
}
