//! Per-host handle for package operations

use hostexec::{Executor, Result, TransportKind};

use crate::apt::{AptCommand, render_hold};
use crate::query;
use crate::types::PackageState;

/// One connected host plus how to drive its package manager
pub struct Machine {
    executor: Executor,
    apt: AptCommand,
    hold_command: String,
    distribution: String,
}

impl Machine {
    /// Wrap an executor without touching the host.
    pub fn new(executor: Executor, apt: AptCommand, hold_command: impl Into<String>) -> Self {
        Self {
            executor,
            apt,
            hold_command: hold_command.into(),
            distribution: String::new(),
        }
    }

    /// Wrap an executor and look up the host's distribution label.
    pub fn open(executor: Executor, apt: AptCommand, hold_command: impl Into<String>) -> Self {
        let mut machine = Self::new(executor, apt, hold_command);
        machine.distribution = query::fetch_distribution(&mut machine.executor);
        machine
    }

    /// Host label
    pub fn host(&self) -> &str {
        self.executor.host()
    }

    /// How the host is reached
    pub fn kind(&self) -> TransportKind {
        self.executor.kind()
    }

    /// Operating system label; empty when unknown
    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    /// Package manager invocation for this host
    pub fn apt(&self) -> &AptCommand {
        &self.apt
    }

    /// Run an arbitrary shell command.
    pub fn execute(&mut self, command: &str) -> Result<String> {
        self.executor.execute(command)
    }

    /// Run `<apt> <subcommand> [packages...]`.
    pub fn execute_apt<S: AsRef<str>>(&mut self, subcommand: &str, packages: &[S]) -> Result<String> {
        let command = self.apt.render(subcommand, packages);
        let output = self.executor.execute(&command)?;
        log::debug!("{subcommand} on {}: {output:?}", self.host());
        Ok(output)
    }

    /// Capture the host's current package selections.
    pub fn fetch_state(&mut self) -> Result<PackageState> {
        query::fetch_state(&mut self.executor)
    }

    /// `<apt> install <packages>`
    pub fn install<S: AsRef<str>>(&mut self, packages: &[S]) -> Result<String> {
        self.execute_apt("install", packages)
    }

    /// `<apt> remove <packages>`
    pub fn remove<S: AsRef<str>>(&mut self, packages: &[S]) -> Result<String> {
        self.execute_apt("remove", packages)
    }

    /// `<apt> purge <packages>`
    pub fn purge<S: AsRef<str>>(&mut self, packages: &[S]) -> Result<String> {
        self.execute_apt("purge", packages)
    }

    /// Hold packages with the hold command; simulate mode does not apply.
    pub fn hold<S: AsRef<str>>(&mut self, packages: &[S]) -> Result<String> {
        let command = render_hold(&self.hold_command, packages);
        self.executor.execute(&command)
    }

    /// Release the host's session.
    pub fn close(&mut self) -> Result<()> {
        self.executor.close()
    }
}
