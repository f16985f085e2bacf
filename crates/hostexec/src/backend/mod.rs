//! Transport abstraction for running commands on a host.
//!
//! The [`Transport`] trait is the only thing the rest of the system needs from
//! a connection: run a command with a timeout over whatever session the
//! transport holds, and release that session when done.

pub mod local;
pub mod scripted;
pub mod ssh;

use crate::error::Result;
use crate::types::{CancelToken, ExecutionResult, TransportKind};
use std::time::Duration;

/// A channel to one host that can run shell commands.
///
/// Implementations report a command that outlived `timeout` as an
/// [`ExecutionResult`] with no exit status rather than as an error; the
/// [`Executor`](crate::Executor) turns that into a timeout error.
pub trait Transport: Send {
    /// Which transport this is.
    fn kind(&self) -> TransportKind;

    /// Host name used in logs and errors.
    fn host(&self) -> &str;

    /// Run `command` through a shell on the host.
    fn run(
        &mut self,
        command: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult>;

    /// Release the session. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
