//! Progress reporting for fleet runs
//!
//! The runner and executor never print; every event goes through a
//! [`SyncReporter`]. All methods default to doing nothing so a reporter
//! only implements what it shows.

use std::collections::BTreeSet;

use crate::config::HostConfig;
use crate::executor::{Phase, PhaseOutcome};

/// Receives progress events from a fleet run
#[allow(unused_variables)]
pub trait SyncReporter {
    /// Processing of `host` begins (`position` is 1-based).
    fn on_host_start(&mut self, host: &HostConfig, position: usize, total: usize) {}

    /// The host's selection table was read.
    fn on_state_fetched(&mut self, host: &str, distribution: &str, packages: usize) {}

    /// The host's snapshot is now the reference.
    fn on_reference_captured(&mut self, host: &str) {}

    /// A second reference host replaced the snapshot of `previous`.
    fn on_duplicate_reference(&mut self, previous: &str, host: &str) {}

    /// A replica came up before any reference was captured.
    fn on_no_reference(&mut self, host: &str) {}

    /// The replica's operating system label differs from the reference's.
    fn on_distribution_mismatch(&mut self, host: &str, reference: &str, replica: &str) {}

    /// A phase begins; `packages` is `None` for maintenance phases.
    fn on_phase_start(&mut self, host: &str, phase: Phase, packages: Option<&BTreeSet<String>>) {}

    /// A phase finished, was skipped or failed.
    fn on_phase_complete(&mut self, host: &str, phase: Phase, outcome: &PhaseOutcome) {}

    /// Output of a one-off command run by `for_each_host`.
    fn on_host_output(&mut self, host: &str, output: &str) {}

    /// The host's processing ended with an error.
    fn on_host_failed(&mut self, host: &str, error: &hostexec::Error) {}

    /// The run stops after `host` because of an interrupt.
    fn on_interrupted(&mut self, host: &str) {}
}

/// Reporter that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReport;

impl SyncReporter for NoReport {}

impl<R: SyncReporter + ?Sized> SyncReporter for &mut R {
    fn on_host_start(&mut self, host: &HostConfig, position: usize, total: usize) {
        (**self).on_host_start(host, position, total);
    }

    fn on_state_fetched(&mut self, host: &str, distribution: &str, packages: usize) {
        (**self).on_state_fetched(host, distribution, packages);
    }

    fn on_reference_captured(&mut self, host: &str) {
        (**self).on_reference_captured(host);
    }

    fn on_duplicate_reference(&mut self, previous: &str, host: &str) {
        (**self).on_duplicate_reference(previous, host);
    }

    fn on_no_reference(&mut self, host: &str) {
        (**self).on_no_reference(host);
    }

    fn on_distribution_mismatch(&mut self, host: &str, reference: &str, replica: &str) {
        (**self).on_distribution_mismatch(host, reference, replica);
    }

    fn on_phase_start(&mut self, host: &str, phase: Phase, packages: Option<&BTreeSet<String>>) {
        (**self).on_phase_start(host, phase, packages);
    }

    fn on_phase_complete(&mut self, host: &str, phase: Phase, outcome: &PhaseOutcome) {
        (**self).on_phase_complete(host, phase, outcome);
    }

    fn on_host_output(&mut self, host: &str, output: &str) {
        (**self).on_host_output(host, output);
    }

    fn on_host_failed(&mut self, host: &str, error: &hostexec::Error) {
        (**self).on_host_failed(host, error);
    }

    fn on_interrupted(&mut self, host: &str) {
        (**self).on_interrupted(host);
    }
}

/// Records events as strings for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub events: Vec<String>,
}

#[cfg(test)]
impl RecordingReporter {
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[cfg(test)]
impl SyncReporter for RecordingReporter {
    fn on_host_start(&mut self, host: &HostConfig, position: usize, total: usize) {
        self.events.push(format!("start {} {position}/{total}", host.host));
    }

    fn on_reference_captured(&mut self, host: &str) {
        self.events.push(format!("reference {host}"));
    }

    fn on_duplicate_reference(&mut self, previous: &str, host: &str) {
        self.events.push(format!("duplicate {previous} {host}"));
    }

    fn on_no_reference(&mut self, host: &str) {
        self.events.push(format!("no-reference {host}"));
    }

    fn on_distribution_mismatch(&mut self, host: &str, _reference: &str, _replica: &str) {
        self.events.push(format!("mismatch {host}"));
    }

    fn on_phase_complete(&mut self, host: &str, phase: Phase, outcome: &PhaseOutcome) {
        self.events
            .push(format!("phase {host} {phase} {}", outcome.label()));
    }

    fn on_host_output(&mut self, host: &str, output: &str) {
        self.events.push(format!("output {host} {output}"));
    }

    fn on_host_failed(&mut self, host: &str, _error: &hostexec::Error) {
        self.events.push(format!("failed {host}"));
    }

    fn on_interrupted(&mut self, host: &str) {
        self.events.push(format!("interrupted {host}"));
    }
}
