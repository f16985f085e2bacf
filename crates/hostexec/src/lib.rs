//! # hostexec
//!
//! Run shell commands on a host, either as local child processes or over a
//! persistent SSH session, with timeouts enforced by polling.
//!
//! This crate provides:
//! - A [`Transport`](backend::Transport) trait with local, SSH and scripted
//!   implementations
//! - An [`Executor`] that applies sudo rewriting, logs every dispatch and
//!   classifies the raw outcome into success, [`Error::Shell`] or
//!   [`Error::Timeout`]
//! - A [`CancelToken`] observed by the poll loop so an interrupt stops the
//!   wait without leaving a local process behind
//!
//! ## Example
//!
//! ```no_run
//! use hostexec::Executor;
//! use hostexec::backend::local::LocalTransport;
//!
//! let mut executor = Executor::new(Box::new(LocalTransport::default()));
//! let release = executor.execute("/usr/bin/lsb_release -ds").expect("lsb_release failed");
//! println!("{release}");
//! ```
//!
//! ## Outcome classification
//!
//! | exit status | stderr    | result                         |
//! |-------------|-----------|--------------------------------|
//! | absent      | any       | [`Error::Timeout`]             |
//! | non-zero    | any       | [`Error::Shell`]               |
//! | zero        | non-empty | `Ok`, stderr logged as warning |
//! | zero        | empty     | `Ok`                           |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod poll;
pub mod types;

pub use error::{Error, Result};
pub use types::{CancelToken, ExecutionResult, SudoStyle, TransportKind};

use backend::Transport;
use std::time::Duration;

/// Default timeout for local commands.
pub const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for commands sent over SSH.
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs commands against one host through a transport.
pub struct Executor {
    transport: Box<dyn Transport>,
    sudo: bool,
    default_timeout: Duration,
    cancel: CancelToken,
}

impl Executor {
    /// Wrap a transport, using its kind's default timeout and no sudo.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let default_timeout = match transport.kind() {
            TransportKind::Local => DEFAULT_LOCAL_TIMEOUT,
            TransportKind::Ssh => DEFAULT_SSH_TIMEOUT,
        };
        Self {
            transport,
            sudo: false,
            default_timeout,
            cancel: CancelToken::new(),
        }
    }

    /// Enable or disable sudo escalation.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Timeout used by [`execute`](Self::execute).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Observe `cancel` while waiting on commands.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Host the transport talks to.
    pub fn host(&self) -> &str {
        self.transport.host()
    }

    /// Kind of the underlying transport.
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Timeout used by [`execute`](Self::execute).
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The command text that will actually be dispatched for `command`.
    pub fn prepare(&self, command: &str) -> String {
        let command = command.trim();
        if self.sudo {
            self.kind().sudo_style().wrap(command)
        } else {
            command.to_string()
        }
    }

    /// Run `command` and classify the outcome.
    ///
    /// Returns the trimmed result only when the command exited with status 0.
    pub fn run(&mut self, command: &str, timeout: Duration) -> Result<ExecutionResult> {
        let command = self.prepare(command);
        log::debug!(
            "Executing {} command {:?} on {}",
            self.kind(),
            command,
            self.host()
        );

        let mut result = self.transport.run(&command, timeout, &self.cancel)?;
        result.stdout = result.stdout.trim().to_string();
        result.stderr = result.stderr.trim().to_string();

        match result.exit_status {
            None => Err(Error::Timeout {
                command,
                host: self.host().to_string(),
                timeout,
                partial_stdout: result.stdout,
            }),
            Some(code) if code != 0 => Err(Error::Shell {
                command,
                host: self.host().to_string(),
                code,
                stderr: result.stderr,
            }),
            Some(_) => {
                if !result.stderr.is_empty() {
                    log::warn!(
                        "Got error output for command {:?} on host {}:\n {}",
                        command,
                        self.host(),
                        result.stderr
                    );
                }
                Ok(result)
            }
        }
    }

    /// Run `command` with the default timeout and return its trimmed stdout.
    pub fn execute(&mut self, command: &str) -> Result<String> {
        let timeout = self.default_timeout;
        self.run(command, timeout).map(|result| result.stdout)
    }

    /// Release the transport's session.
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }
}
