//! Best-effort application of a sync plan
//!
//! The plan is applied as a fixed sequence of independent phases. Each phase
//! produces a [`PhaseOutcome`]; a failed phase is reported and the next one
//! runs anyway. Only an interrupt stops the sequence.

use std::collections::BTreeSet;
use std::fmt;

use crate::context::SyncReporter;
use crate::machine::Machine;
use crate::planner::SyncPlan;

/// One step of applying a plan, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Refresh the package index
    Update,
    /// Install what the reference has installed
    Install,
    /// Remove what the reference has deinstalled
    Remove,
    /// Purge what the reference has purged
    Purge,
    /// Hold what the reference holds
    Hold,
    /// Drop dependencies nothing needs any more
    Autoremove,
    /// Empty the package cache
    Clean,
    /// Drop cached packages that can no longer be downloaded
    Autoclean,
}

impl Phase {
    /// Every phase in execution order
    pub const ALL: [Self; 8] = [
        Self::Update,
        Self::Install,
        Self::Remove,
        Self::Purge,
        Self::Hold,
        Self::Autoremove,
        Self::Clean,
        Self::Autoclean,
    ];

    /// Package manager subcommand (or hold) the phase issues
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Purge => "purge",
            Self::Hold => "hold",
            Self::Autoremove => "autoremove",
            Self::Clean => "clean",
            Self::Autoclean => "autoclean",
        }
    }

    /// Transition the phase performs, for reports
    pub fn description(self) -> &'static str {
        match self {
            Self::Update => "refresh package index",
            Self::Install => "remove, purge => install",
            Self::Remove => "install => remove",
            Self::Purge => "install => purge",
            Self::Hold => "install => hold",
            Self::Autoremove => "remove unused dependencies",
            Self::Clean => "clear package cache",
            Self::Autoclean => "clear obsolete packages",
        }
    }

    /// 1-based position in [`Phase::ALL`]
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).map_or(0, |i| i + 1)
    }

    /// Whether the phase runs regardless of the plan
    pub fn is_maintenance(self) -> bool {
        matches!(
            self,
            Self::Update | Self::Autoremove | Self::Clean | Self::Autoclean
        )
    }

    /// Package set the phase acts on; `None` for maintenance phases
    pub fn packages(self, plan: &SyncPlan) -> Option<&BTreeSet<String>> {
        match self {
            Self::Install => Some(&plan.to_install),
            Self::Remove => Some(&plan.to_remove),
            Self::Purge => Some(&plan.to_purge),
            Self::Hold => Some(&plan.to_hold),
            Self::Update | Self::Autoremove | Self::Clean | Self::Autoclean => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// Result of one phase
#[derive(Debug)]
pub enum PhaseOutcome {
    /// The command ran and succeeded
    Applied {
        /// Trimmed stdout of the command
        output: String,
    },
    /// Nothing was dispatched
    Skipped {
        /// Why the phase did not run
        reason: String,
    },
    /// The command failed, timed out or was interrupted
    Failed {
        /// What went wrong
        error: hostexec::Error,
    },
}

impl PhaseOutcome {
    /// Whether the phase failed for any reason.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether the phase was cut short by an interrupt.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Failed { error } if error.is_interrupt())
    }

    /// Short status word
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome of applying one plan to one host
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// Phases that were reached, in execution order
    pub phases: Vec<(Phase, PhaseOutcome)>,
    /// Stopped early because of an interrupt
    pub interrupted: bool,
}

impl SyncSummary {
    /// Failed phases with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (Phase, &hostexec::Error)> {
        self.phases.iter().filter_map(|(phase, outcome)| match outcome {
            PhaseOutcome::Failed { error } => Some((*phase, error)),
            _ => None,
        })
    }

    /// Number of phases that ran successfully.
    pub fn applied(&self) -> usize {
        self.phases
            .iter()
            .filter(|(_, o)| matches!(o, PhaseOutcome::Applied { .. }))
            .count()
    }

    /// Outcome of `phase`, if it was reached.
    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, outcome)| outcome)
    }
}

/// Apply `plan` to `machine`, phase by phase.
pub fn apply<R: SyncReporter + ?Sized>(
    machine: &mut Machine,
    plan: &SyncPlan,
    reporter: &mut R,
) -> SyncSummary {
    let mut summary = SyncSummary::default();
    log::info!(
        "Applying {} package changes to {}",
        plan.len(),
        machine.host()
    );

    for phase in Phase::ALL {
        let packages = phase.packages(plan);
        reporter.on_phase_start(machine.host(), phase, packages);

        let outcome = run_phase(machine, phase, packages);
        if let PhaseOutcome::Failed { error } = &outcome {
            log::warn!("Phase {} failed on {}: {}", phase, machine.host(), error);
        }
        reporter.on_phase_complete(machine.host(), phase, &outcome);

        let interrupted = outcome.is_interrupt();
        summary.phases.push((phase, outcome));
        if interrupted {
            summary.interrupted = true;
            break;
        }
    }

    summary
}

fn run_phase(
    machine: &mut Machine,
    phase: Phase,
    packages: Option<&BTreeSet<String>>,
) -> PhaseOutcome {
    let names: Vec<&str> = match packages {
        Some(set) if set.is_empty() => {
            return PhaseOutcome::Skipped {
                reason: "nothing to do".to_string(),
            };
        }
        Some(set) => set.iter().map(String::as_str).collect(),
        None => Vec::new(),
    };

    let result = match phase {
        Phase::Hold => machine.hold(&names),
        _ => machine.execute_apt(phase.subcommand(), &names),
    };

    match result {
        Ok(output) => PhaseOutcome::Applied { output },
        Err(error) => PhaseOutcome::Failed { error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apt::{AptCommand, DEFAULT_HOLD_COMMAND};
    use crate::context::{NoReport, RecordingReporter};
    use hostexec::backend::scripted::ScriptedTransport;
    use hostexec::{CancelToken, ExecutionResult, Executor, TransportKind};

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| (*n).to_string()).collect()
    }

    fn machine(transport: ScriptedTransport) -> Machine {
        Machine::new(
            Executor::new(Box::new(transport)),
            AptCommand::default(),
            DEFAULT_HOLD_COMMAND,
        )
    }

    #[test]
    fn test_phase_order() {
        let order: Vec<&str> = Phase::ALL.iter().map(|p| p.subcommand()).collect();
        assert_eq!(
            order,
            ["update", "install", "remove", "purge", "hold", "autoremove", "clean", "autoclean"]
        );
        assert_eq!(Phase::Update.position(), 1);
        assert_eq!(Phase::Autoclean.position(), 8);
        let maintenance: Vec<Phase> = Phase::ALL.into_iter().filter(|p| p.is_maintenance()).collect();
        assert_eq!(
            maintenance,
            [Phase::Update, Phase::Autoremove, Phase::Clean, Phase::Autoclean]
        );
    }

    #[test]
    fn test_full_plan_dispatches_in_order() {
        let transport = ScriptedTransport::new(TransportKind::Ssh, "web1");
        let log = transport.log();
        let mut machine = machine(transport);
        let plan = SyncPlan {
            to_install: names(&["git", "vim"]),
            to_remove: names(&["nano"]),
            to_purge: names(&["libfoo"]),
            to_hold: names(&["linux-image"]),
        };

        let summary = apply(&mut machine, &plan, &mut NoReport);
        assert_eq!(summary.applied(), 8);
        assert_eq!(
            log.commands(),
            [
                "/usr/bin/apt-get update",
                "/usr/bin/apt-get install git vim",
                "/usr/bin/apt-get remove nano",
                "/usr/bin/apt-get purge libfoo",
                "aptitude hold linux-image",
                "/usr/bin/apt-get autoremove",
                "/usr/bin/apt-get clean",
                "/usr/bin/apt-get autoclean",
            ]
        );
    }

    #[test]
    fn test_empty_sets_are_skipped() {
        let transport = ScriptedTransport::new(TransportKind::Ssh, "web1");
        let log = transport.log();
        let mut machine = machine(transport);
        let plan = SyncPlan {
            to_remove: names(&["nano"]),
            ..Default::default()
        };

        let summary = apply(&mut machine, &plan, &mut NoReport);
        assert!(matches!(
            summary.outcome(Phase::Install),
            Some(PhaseOutcome::Skipped { .. })
        ));
        assert!(matches!(
            summary.outcome(Phase::Hold),
            Some(PhaseOutcome::Skipped { .. })
        ));
        assert_eq!(log.commands().len(), 5);
        assert!(!log.commands().iter().any(|c| c.contains("install")));
    }

    #[test]
    fn test_failed_phase_does_not_stop_later_phases() {
        let transport = ScriptedTransport::new(TransportKind::Ssh, "web1")
            .on("update", ExecutionResult::exited(100, "", "E: Could not get lock"))
            .on("install", ExecutionResult::timed_out("Unpacking vim ..."));
        let log = transport.log();
        let mut machine = machine(transport);
        let plan = SyncPlan {
            to_install: names(&["vim"]),
            ..Default::default()
        };
        let mut reporter = RecordingReporter::default();

        let summary = apply(&mut machine, &plan, &mut reporter);
        let failed: Vec<Phase> = summary.failures().map(|(phase, _)| phase).collect();
        assert_eq!(failed, [Phase::Update, Phase::Install]);
        assert!(!summary.interrupted);
        assert_eq!(summary.phases.len(), 8);
        assert!(log.commands().iter().any(|c| c.ends_with("autoclean")));
        assert_eq!(reporter.count("phase web1 update failed"), 1);
        assert_eq!(reporter.count("phase web1 clean applied"), 1);
    }

    #[test]
    fn test_interrupt_stops_remaining_phases() {
        let cancel = CancelToken::new();
        let transport = ScriptedTransport::new(TransportKind::Ssh, "web1");
        let log = transport.log();
        let mut machine = Machine::new(
            Executor::new(Box::new(transport)).with_cancel(cancel.clone()),
            AptCommand::default(),
            DEFAULT_HOLD_COMMAND,
        );
        cancel.cancel();

        let summary = apply(&mut machine, &SyncPlan::default(), &mut NoReport);
        assert!(summary.interrupted);
        assert_eq!(summary.phases.len(), 1);
        assert!(summary.phases[0].1.is_interrupt());
        assert!(log.commands().is_empty());
    }
}
