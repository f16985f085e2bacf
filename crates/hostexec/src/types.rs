//! Core types for command execution.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How commands reach a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Child process on this machine
    Local,
    /// Command multiplexed over a persistent SSH session
    Ssh,
}

impl TransportKind {
    /// The sudo rewriting this transport applies.
    pub fn sudo_style(&self) -> SudoStyle {
        match self {
            Self::Local => SudoStyle::Quoted,
            Self::Ssh => SudoStyle::Prefix,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Ssh => write!(f, "ssh"),
        }
    }
}

/// How a command is wrapped when sudo escalation is enabled.
///
/// The two transports historically disagree: local commands are wrapped in
/// double quotes, SSH commands are prefixed as-is. Both forms are kept
/// distinct on purpose until the quoting is confirmed against a real shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SudoStyle {
    /// `sudo "<command>"`
    Quoted,
    /// `sudo <command>`
    Prefix,
}

impl SudoStyle {
    /// Rewrite a command for privilege escalation.
    pub fn wrap(&self, command: &str) -> String {
        match self {
            Self::Quoted => format!("sudo \"{command}\""),
            Self::Prefix => format!("sudo {command}"),
        }
    }
}

/// Raw outcome of running one command, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status; `None` when the command did not finish within the timeout
    pub exit_status: Option<i32>,
    /// Wall-clock time spent waiting
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// A finished command with the given status and output.
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: Some(code),
            elapsed: Duration::ZERO,
        }
    }

    /// A command that never reported completion.
    pub fn timed_out(partial_stdout: impl Into<String>) -> Self {
        Self {
            stdout: partial_stdout.into(),
            stderr: String::new(),
            exit_status: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the command finished with status 0.
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Shared flag used to abandon waiting on a running command.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
