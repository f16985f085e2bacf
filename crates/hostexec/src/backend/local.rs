//! Local transport: commands run as child processes of this program.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::backend::Transport;
use crate::error::{Error, Result};
use crate::poll::{OutputCapture, WaitOutcome, exit_code, kill_group, wait_for_exit};
use crate::types::{CancelToken, ExecutionResult, TransportKind};

/// Transport that runs commands through `sh -c` on this machine.
///
/// Every command gets its own process group so that a timeout kills the
/// whole pipeline, not just the shell.
pub struct LocalTransport {
    host: String,
}

impl LocalTransport {
    /// Create a local transport labelled with `host` for logs and errors.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl Transport for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn run(
        &mut self,
        command: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;

        let capture = OutputCapture::attach(&mut child);
        let outcome = match wait_for_exit(&mut child, timeout, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                kill_group(&mut child);
                return Err(e.into());
            }
        };

        match outcome {
            WaitOutcome::Exited(status) => {
                let (stdout, stderr) = capture.collect();
                Ok(ExecutionResult {
                    stdout,
                    stderr,
                    exit_status: Some(exit_code(status)),
                    elapsed: start.elapsed(),
                })
            }
            WaitOutcome::TimedOut => {
                log::debug!(
                    "killing process group {} for {:?} on {}",
                    child.id(),
                    command,
                    self.host
                );
                kill_group(&mut child);
                let (stdout, stderr) = capture.collect();
                Ok(ExecutionResult {
                    stdout,
                    stderr,
                    exit_status: None,
                    elapsed: start.elapsed(),
                })
            }
            WaitOutcome::Cancelled => {
                kill_group(&mut child);
                let _ = capture.collect();
                Err(Error::Interrupted {
                    command: command.to_string(),
                    host: self.host.clone(),
                })
            }
        }
    }
}
