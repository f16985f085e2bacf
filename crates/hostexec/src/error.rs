//! Error types for command execution.
//!
//! Every variant carries enough context (command text, host, captured
//! output) for the caller to report the failure without re-running anything.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while executing a command on a host.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport session could not be established
    #[error("could not connect to {host}: {message}")]
    Connection {
        /// Host the session was opened against
        host: String,
        /// Diagnostic from the transport (usually ssh stderr)
        message: String,
    },

    /// The command did not report completion within its timeout
    #[error(
        "command \"{command}\" on host {host} timed out after {} seconds{}",
        .timeout.as_secs(),
        output_suffix(.partial_stdout)
    )]
    Timeout {
        /// Command text as dispatched (after sudo rewriting)
        command: String,
        /// Host the command ran on
        host: String,
        /// Timeout that elapsed
        timeout: Duration,
        /// Whatever stdout was captured before giving up
        partial_stdout: String,
    },

    /// The command completed with a non-zero exit status
    #[error(
        "command \"{command}\" on host {host} returned {code}, messages:{}",
        output_suffix(.stderr)
    )]
    Shell {
        /// Command text as dispatched (after sudo rewriting)
        command: String,
        /// Host the command ran on
        host: String,
        /// Exit status reported by the shell
        code: i32,
        /// Trimmed stderr of the command
        stderr: String,
    },

    /// Waiting was abandoned because an interrupt was requested
    #[error("command \"{command}\" on host {host} was interrupted")]
    Interrupted {
        /// Command text as dispatched
        command: String,
        /// Host the command ran on
        host: String,
    },

    /// Spawning or talking to a local process failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was caused by an interrupt request.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Host the error relates to, if known.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Connection { host, .. }
            | Self::Timeout { host, .. }
            | Self::Shell { host, .. }
            | Self::Interrupted { host, .. } => Some(host),
            Self::Io(_) => None,
        }
    }
}

fn output_suffix(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!("\n{output}")
    }
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, Error>;
