//! Fleet runner - drives every configured host in turn
//!
//! Hosts are processed strictly one after another. The reference host's
//! snapshot must be captured before any replica can be synchronized; a
//! replica visited earlier is reported and left alone.
//!
//! Every host's connection is released on every exit path. A failure is
//! reported at the host boundary and the loop moves on; an interrupt stops
//! the remaining hosts.

use hostexec::backend::Transport;
use hostexec::backend::local::LocalTransport;
use hostexec::backend::ssh::{SshTarget, SshTransport};
use hostexec::{CancelToken, Executor};

use crate::config::{HostConfig, SyncSettings};
use crate::context::SyncReporter;
use crate::executor::{SyncSummary, apply};
use crate::machine::Machine;
use crate::planner::SyncPlan;
use crate::types::PackageState;

/// Opens a [`Machine`] for a configured host
pub trait Connector {
    /// Reach `host` and wrap it in a [`Machine`].
    fn connect(
        &mut self,
        host: &HostConfig,
        settings: &SyncSettings,
        cancel: &CancelToken,
    ) -> hostexec::Result<Machine>;
}

impl<F> Connector for F
where
    F: FnMut(&HostConfig, &SyncSettings, &CancelToken) -> hostexec::Result<Machine>,
{
    fn connect(
        &mut self,
        host: &HostConfig,
        settings: &SyncSettings,
        cancel: &CancelToken,
    ) -> hostexec::Result<Machine> {
        self(host, settings, cancel)
    }
}

/// Connector opening real local or SSH transports
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportConnector;

impl TransportConnector {
    fn transport(host: &HostConfig, cancel: &CancelToken) -> hostexec::Result<Box<dyn Transport>> {
        if !host.ssh {
            return Ok(Box::new(LocalTransport::new(host.host.clone())));
        }

        let mut target = SshTarget::new(host.host.clone());
        if let Some(username) = &host.username {
            target = target.with_username(username.clone());
        }
        if let Some(port) = host.port {
            target = target.with_port(port);
        }
        if let Some(key) = host.key_path() {
            target = target.with_identity_file(key);
        }
        if let Some(password) = &host.password {
            target = target.with_password(password.clone());
        }
        Ok(Box::new(SshTransport::connect(target, cancel)?))
    }
}

impl Connector for TransportConnector {
    fn connect(
        &mut self,
        host: &HostConfig,
        settings: &SyncSettings,
        cancel: &CancelToken,
    ) -> hostexec::Result<Machine> {
        let executor = Executor::new(Self::transport(host, cancel)?)
            .with_sudo(host.sudo)
            .with_timeout(settings.timeout_for(host))
            .with_cancel(cancel.clone());
        Ok(Machine::open(
            executor,
            settings.apt_command_for(host),
            settings.hold_command.clone(),
        ))
    }
}

/// What happened to one host during a sync run
#[derive(Debug)]
pub enum HostOutcome {
    /// Snapshot captured as the reference
    Reference {
        /// Size of the snapshot
        packages: usize,
    },
    /// Plan derived and applied
    Synced {
        /// Changes derived against the reference
        plan: SyncPlan,
        /// Per-phase results of applying them
        summary: SyncSummary,
    },
    /// No reference captured yet; nothing applied
    NoReference,
    /// Connecting or fetching state failed
    Failed(hostexec::Error),
}

/// One host's line in a [`FleetSummary`]
#[derive(Debug)]
pub struct HostReport {
    /// Host label
    pub host: String,
    /// What happened to it
    pub outcome: HostOutcome,
}

/// Outcome of a whole sync run
#[derive(Debug, Default)]
pub struct FleetSummary {
    /// Visited hosts, in visiting order
    pub hosts: Vec<HostReport>,
    /// The run stopped early because of an interrupt
    pub interrupted: bool,
}

impl FleetSummary {
    /// Hosts that could not be reached or queried.
    pub fn failed(&self) -> usize {
        self.hosts
            .iter()
            .filter(|r| matches!(r.outcome, HostOutcome::Failed(_)))
            .count()
    }

    /// Hosts a plan was applied to.
    pub fn synced(&self) -> usize {
        self.hosts
            .iter()
            .filter(|r| matches!(r.outcome, HostOutcome::Synced { .. }))
            .count()
    }
}

/// Outcome of running one command on every host
#[derive(Debug, Default)]
pub struct TaskSummary {
    /// Host label and command output, per visited host
    pub results: Vec<(String, hostexec::Result<String>)>,
    /// The run stopped early because of an interrupt
    pub interrupted: bool,
}

impl TaskSummary {
    /// Hosts where the command failed.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }
}

struct Reference {
    host: String,
    distribution: String,
    state: PackageState,
}

/// Drives sync and ad-hoc tasks across the fleet
pub struct FleetRunner<'a, C, R> {
    settings: &'a SyncSettings,
    connector: C,
    reporter: R,
    cancel: CancelToken,
}

impl<'a, C: Connector, R: SyncReporter> FleetRunner<'a, C, R> {
    /// Runner reaching hosts through `connector` and reporting to `reporter`.
    pub fn new(settings: &'a SyncSettings, connector: C, reporter: R) -> Self {
        Self {
            settings,
            connector,
            reporter,
            cancel: CancelToken::new(),
        }
    }

    /// Stop at the next poll once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The reporter events went to.
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Give the reporter back.
    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Visiting order: configured order, or references first when asked
    fn ordered<'h>(&self, hosts: &'h [HostConfig]) -> Vec<&'h HostConfig> {
        let mut ordered: Vec<&HostConfig> = hosts.iter().collect();
        if self.settings.reference_first {
            ordered.sort_by_key(|host| !host.reference);
        }
        ordered
    }

    /// Synchronize every replica towards the reference.
    pub fn run(&mut self, hosts: &[HostConfig]) -> FleetSummary {
        let ordered = self.ordered(hosts);
        let total = ordered.len();
        let mut reference: Option<Reference> = None;
        let mut summary = FleetSummary::default();

        for (index, host) in ordered.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            self.reporter.on_host_start(host, index + 1, total);

            let outcome = match self.connector.connect(host, self.settings, &self.cancel) {
                Ok(mut machine) => {
                    let outcome = self.sync_host(&mut machine, host, &mut reference);
                    release(&mut machine);
                    outcome
                }
                Err(e) => Err(e),
            };

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.reporter.on_host_failed(&host.host, &error);
                    if error.is_interrupt() {
                        summary.interrupted = true;
                    } else {
                        log::error!("Host {} failed: {}", host.host, error);
                    }
                    HostOutcome::Failed(error)
                }
            };

            if let HostOutcome::Synced { summary: sync, .. } = &outcome {
                summary.interrupted |= sync.interrupted;
            }
            summary.hosts.push(HostReport {
                host: host.host.clone(),
                outcome,
            });

            if summary.interrupted {
                self.reporter.on_interrupted(&host.host);
                log::warn!("Interrupted; skipping remaining hosts");
                break;
            }
        }

        summary
    }

    fn sync_host(
        &mut self,
        machine: &mut Machine,
        host: &HostConfig,
        reference: &mut Option<Reference>,
    ) -> hostexec::Result<HostOutcome> {
        let state = machine.fetch_state()?;
        self.reporter
            .on_state_fetched(&host.host, machine.distribution(), state.len());

        if host.reference {
            if let Some(previous) = reference.as_ref() {
                log::warn!(
                    "Multiple reference hosts: {} replaces {} as the reference",
                    host.host,
                    previous.host
                );
                self.reporter
                    .on_duplicate_reference(&previous.host, &host.host);
            }
            let packages = state.len();
            *reference = Some(Reference {
                host: host.host.clone(),
                distribution: machine.distribution().to_string(),
                state,
            });
            self.reporter.on_reference_captured(&host.host);
            return Ok(HostOutcome::Reference { packages });
        }

        let Some(reference) = reference.as_ref() else {
            self.reporter.on_no_reference(&host.host);
            return Ok(HostOutcome::NoReference);
        };

        if machine.distribution() != reference.distribution {
            log::warn!(
                "{} runs {:?}, reference {} runs {:?}",
                host.host,
                machine.distribution(),
                reference.host,
                reference.distribution
            );
            self.reporter.on_distribution_mismatch(
                &host.host,
                &reference.distribution,
                machine.distribution(),
            );
        }

        let plan = SyncPlan::derive(&reference.state, &state);
        let summary = apply(machine, &plan, &mut self.reporter);
        Ok(HostOutcome::Synced { plan, summary })
    }

    /// Run `op` against every host in configured order.
    ///
    /// Failures are reported per host; an interrupt stops the loop.
    pub fn for_each_host<F>(&mut self, hosts: &[HostConfig], mut op: F) -> TaskSummary
    where
        F: FnMut(&mut Machine) -> hostexec::Result<String>,
    {
        let total = hosts.len();
        let mut summary = TaskSummary::default();

        for (index, host) in hosts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            self.reporter.on_host_start(host, index + 1, total);

            let result = self
                .connector
                .connect(host, self.settings, &self.cancel)
                .and_then(|mut machine| {
                    let result = op(&mut machine);
                    release(&mut machine);
                    result
                });

            match &result {
                Ok(output) => self.reporter.on_host_output(&host.host, output),
                Err(error) => {
                    self.reporter.on_host_failed(&host.host, error);
                    summary.interrupted = error.is_interrupt();
                }
            }
            summary.results.push((host.host.clone(), result));

            if summary.interrupted {
                self.reporter.on_interrupted(&host.host);
                break;
            }
        }

        summary
    }
}

fn release(machine: &mut Machine) {
    if let Err(e) = machine.close() {
        log::warn!("Failed to close connection to {}: {}", machine.host(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apt::DEFAULT_HOLD_COMMAND;
    use crate::context::RecordingReporter;
    use crate::executor::{Phase, PhaseOutcome};
    use hostexec::backend::scripted::{ScriptLog, ScriptedTransport};
    use hostexec::{Error, ExecutionResult, TransportKind};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Hands out scripted transports by host name and keeps their logs.
    #[derive(Default)]
    struct ScriptedFleet {
        selections: HashMap<String, String>,
        distributions: HashMap<String, String>,
        unreachable: Vec<String>,
        logs: HashMap<String, Arc<ScriptLog>>,
    }

    impl ScriptedFleet {
        fn host(mut self, name: &str, distribution: &str, selections: &str) -> Self {
            self.selections
                .insert(name.to_string(), selections.to_string());
            self.distributions
                .insert(name.to_string(), distribution.to_string());
            self
        }

        fn unreachable(mut self, name: &str) -> Self {
            self.unreachable.push(name.to_string());
            self
        }

        fn commands(&self, host: &str) -> Vec<String> {
            self.logs.get(host).map(|log| log.commands()).unwrap_or_default()
        }

        fn released(&self, host: &str) -> bool {
            self.logs.get(host).is_some_and(|log| log.close_count() > 0)
        }
    }

    impl Connector for ScriptedFleet {
        fn connect(
            &mut self,
            host: &HostConfig,
            settings: &SyncSettings,
            cancel: &CancelToken,
        ) -> hostexec::Result<Machine> {
            if self.unreachable.contains(&host.host) {
                return Err(Error::Connection {
                    host: host.host.clone(),
                    message: "Connection refused".to_string(),
                });
            }
            let selections = self.selections.get(&host.host).cloned().unwrap_or_default();
            let distribution = self
                .distributions
                .get(&host.host)
                .cloned()
                .unwrap_or_default();
            let transport = ScriptedTransport::new(TransportKind::Ssh, host.host.clone())
                .on_stdout("dpkg --get-selections", selections)
                .on_stdout("lsb_release", distribution);
            self.logs.insert(host.host.clone(), transport.log());

            let executor = Executor::new(Box::new(transport))
                .with_sudo(host.sudo)
                .with_cancel(cancel.clone());
            Ok(Machine::open(
                executor,
                settings.apt_command_for(host),
                DEFAULT_HOLD_COMMAND,
            ))
        }
    }

    fn reference(name: &str) -> HostConfig {
        HostConfig {
            reference: true,
            ..HostConfig::new(name)
        }
    }

    /// Borrows the fleet so its logs stay inspectable after the run.
    fn connector(fleet: &mut ScriptedFleet) -> impl Connector + '_ {
        move |host: &HostConfig, settings: &SyncSettings, cancel: &CancelToken| {
            fleet.connect(host, settings, cancel)
        }
    }

    fn run(
        fleet: ScriptedFleet,
        settings: &SyncSettings,
        hosts: &[HostConfig],
    ) -> (FleetSummary, RecordingReporter, ScriptedFleet) {
        let mut fleet = fleet;
        let mut reporter = RecordingReporter::default();
        let summary = FleetRunner::new(settings, connector(&mut fleet), &mut reporter).run(hosts);
        (summary, reporter, fleet)
    }

    const DEBIAN: &str = "Debian GNU/Linux 12 (bookworm)";

    #[test]
    fn test_replica_is_synced_to_reference() {
        let fleet = ScriptedFleet::default()
            .host("ref", DEBIAN, "vim install\nnano deinstall\nlinux-image hold\n")
            .host("web1", DEBIAN, "vim deinstall\nnano install\n");
        let hosts = [reference("ref"), HostConfig::new("web1")];

        let (summary, reporter, fleet) = run(fleet, &SyncSettings::default(), &hosts);

        assert!(!summary.interrupted);
        assert_eq!(summary.synced(), 1);
        match &summary.hosts[1].outcome {
            HostOutcome::Synced { plan, summary } => {
                assert!(plan.to_install.contains("vim"));
                assert!(plan.to_remove.contains("nano"));
                assert!(plan.to_hold.contains("linux-image"));
                assert!(summary.failures().next().is_none());
            }
            other => panic!("expected synced host, got {other:?}"),
        }
        let commands = fleet.commands("web1");
        assert!(commands.contains(&"/usr/bin/apt-get install vim".to_string()));
        assert!(commands.contains(&"/usr/bin/apt-get remove nano".to_string()));
        assert!(commands.contains(&"aptitude hold linux-image".to_string()));
        // The reference is only read, never changed.
        assert!(!fleet.commands("ref").iter().any(|c| c.contains("apt-get")));
        assert!(fleet.released("ref") && fleet.released("web1"));
        assert_eq!(reporter.count("mismatch"), 0);
    }

    #[test]
    fn test_replica_before_reference_is_not_synced() {
        let fleet = ScriptedFleet::default()
            .host("web1", DEBIAN, "vim install\n")
            .host("ref", DEBIAN, "vim deinstall\n");
        let hosts = [HostConfig::new("web1"), reference("ref")];

        let (summary, reporter, fleet) = run(fleet, &SyncSettings::default(), &hosts);
        assert!(matches!(summary.hosts[0].outcome, HostOutcome::NoReference));
        assert_eq!(reporter.count("no-reference web1"), 1);
        assert!(!fleet.commands("web1").iter().any(|c| c.contains("apt-get")));
        assert!(fleet.released("web1"));
    }

    #[test]
    fn test_reference_first_reorders_hosts() {
        let fleet = ScriptedFleet::default()
            .host("web1", DEBIAN, "vim install\n")
            .host("web2", DEBIAN, "vim install\n")
            .host("ref", DEBIAN, "vim deinstall\n");
        let hosts = [
            HostConfig::new("web1"),
            reference("ref"),
            HostConfig::new("web2"),
        ];
        let settings = SyncSettings {
            reference_first: true,
            ..Default::default()
        };

        let (summary, reporter, _) = run(fleet, &settings, &hosts);
        let order: Vec<&str> = summary.hosts.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(order, ["ref", "web1", "web2"]);
        assert_eq!(summary.synced(), 2);
        assert_eq!(reporter.events[0], "start ref 1/3");
    }

    #[test]
    fn test_failed_host_does_not_stop_the_fleet() {
        let fleet = ScriptedFleet::default()
            .host("ref", DEBIAN, "vim install\n")
            .unreachable("web1")
            .host("web2", DEBIAN, "");
        let hosts = [
            reference("ref"),
            HostConfig::new("web1"),
            HostConfig::new("web2"),
        ];

        let (summary, reporter, fleet) = run(fleet, &SyncSettings::default(), &hosts);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.synced(), 1);
        assert_eq!(reporter.count("failed web1"), 1);
        assert!(fleet.commands("web2").contains(&"/usr/bin/apt-get install vim".to_string()));
    }

    #[test]
    fn test_query_failure_is_reported_and_connection_released() {
        struct FailingQuery;
        impl Connector for FailingQuery {
            fn connect(
                &mut self,
                host: &HostConfig,
                _settings: &SyncSettings,
                _cancel: &CancelToken,
            ) -> hostexec::Result<Machine> {
                let transport = ScriptedTransport::new(TransportKind::Ssh, host.host.clone())
                    .on("dpkg", ExecutionResult::timed_out(""));
                Ok(Machine::new(
                    Executor::new(Box::new(transport)),
                    Default::default(),
                    DEFAULT_HOLD_COMMAND,
                ))
            }
        }

        let settings = SyncSettings::default();
        let mut reporter = RecordingReporter::default();
        let summary = FleetRunner::new(&settings, FailingQuery, &mut reporter)
            .run(&[reference("ref"), HostConfig::new("web1")]);
        assert_eq!(summary.failed(), 2);
        assert!(!summary.interrupted);
        assert!(matches!(
            &summary.hosts[0].outcome,
            HostOutcome::Failed(Error::Timeout { .. })
        ));
    }

    #[test]
    fn test_duplicate_reference_warns_and_last_wins() {
        let fleet = ScriptedFleet::default()
            .host("ref1", DEBIAN, "vim install\n")
            .host("ref2", DEBIAN, "git install\n")
            .host("web1", DEBIAN, "");
        let hosts = [reference("ref1"), reference("ref2"), HostConfig::new("web1")];

        let (summary, reporter, fleet) = run(fleet, &SyncSettings::default(), &hosts);
        assert_eq!(reporter.count("duplicate ref1 ref2"), 1);
        assert_eq!(summary.synced(), 1);
        let commands = fleet.commands("web1");
        assert!(commands.contains(&"/usr/bin/apt-get install git".to_string()));
        assert!(!commands.iter().any(|c| c.contains("install vim")));
    }

    #[test]
    fn test_distribution_mismatch_warns_but_syncs() {
        let fleet = ScriptedFleet::default()
            .host("ref", DEBIAN, "vim install\n")
            .host("old", "Debian GNU/Linux 11 (bullseye)", "");
        let hosts = [reference("ref"), HostConfig::new("old")];

        let (summary, reporter, _) = run(fleet, &SyncSettings::default(), &hosts);
        assert_eq!(reporter.count("mismatch old"), 1);
        assert_eq!(summary.synced(), 1);
    }

    #[test]
    fn test_interrupt_stops_remaining_hosts_after_release() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let fleet = ScriptedFleet::default()
            .host("ref", DEBIAN, "vim install\n")
            .host("web1", DEBIAN, "")
            .host("web2", DEBIAN, "");
        let hosts = [
            reference("ref"),
            HostConfig::new("web1"),
            HostConfig::new("web2"),
        ];

        struct CancelOnPhase<'r> {
            inner: &'r mut RecordingReporter,
            trigger: CancelToken,
        }
        impl SyncReporter for CancelOnPhase<'_> {
            fn on_phase_complete(&mut self, host: &str, phase: Phase, outcome: &PhaseOutcome) {
                self.inner.on_phase_complete(host, phase, outcome);
                if phase == Phase::Install {
                    self.trigger.cancel();
                }
            }
            fn on_interrupted(&mut self, host: &str) {
                self.inner.on_interrupted(host);
            }
        }

        let mut fleet = fleet;
        let mut recorder = RecordingReporter::default();
        let settings = SyncSettings::default();
        let reporter = CancelOnPhase {
            inner: &mut recorder,
            trigger,
        };
        let summary = FleetRunner::new(&settings, connector(&mut fleet), reporter)
            .with_cancel(cancel)
            .run(&hosts);

        assert!(summary.interrupted);
        assert_eq!(summary.hosts.len(), 2);
        match &summary.hosts[1].outcome {
            HostOutcome::Synced { summary, .. } => {
                assert!(summary.interrupted);
                // Empty sets are skipped without dispatch; autoremove is the
                // first command to see the interrupt.
                let (phase, outcome) = summary.phases.last().unwrap();
                assert_eq!(*phase, Phase::Autoremove);
                assert!(outcome.is_interrupt());
            }
            other => panic!("expected interrupted sync, got {other:?}"),
        }
        assert!(fleet.released("web1"));
        assert!(fleet.commands("web2").is_empty());
        assert_eq!(recorder.count("interrupted web1"), 1);
    }

    #[test]
    fn test_for_each_host_isolates_failures() {
        let fleet = ScriptedFleet::default()
            .host("a", DEBIAN, "")
            .unreachable("b")
            .host("c", DEBIAN, "");
        let hosts = [HostConfig::new("a"), HostConfig::new("b"), HostConfig::new("c")];
        let settings = SyncSettings::default();
        let mut fleet = fleet;
        let mut reporter = RecordingReporter::default();

        let summary = FleetRunner::new(&settings, connector(&mut fleet), &mut reporter)
            .for_each_host(&hosts, |machine| machine.execute("uptime"));

        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.interrupted);
        assert_eq!(reporter.count("output"), 2);
        assert!(fleet.commands("c").contains(&"uptime".to_string()));
        assert!(fleet.released("a") && fleet.released("c"));
    }

    #[test]
    fn test_closure_connector() {
        let settings = SyncSettings::default();
        let connector = |host: &HostConfig,
                         _: &SyncSettings,
                         _: &CancelToken|
         -> hostexec::Result<Machine> {
            let transport = ScriptedTransport::new(TransportKind::Local, host.host.clone())
                .on_stdout("hostname", host.host.clone());
            Ok(Machine::new(
                Executor::new(Box::new(transport)),
                Default::default(),
                DEFAULT_HOLD_COMMAND,
            ))
        };
        let summary = FleetRunner::new(&settings, connector, crate::context::NoReport)
            .for_each_host(&[HostConfig::new("box")], |machine| machine.execute("hostname"));
        assert_eq!(summary.results[0].1.as_deref().ok(), Some("box"));
    }
}
