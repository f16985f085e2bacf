//! Bounded-interval polling shared by the process-backed transports.
//!
//! Both the local and the SSH transport spawn a child process and wait for it
//! the same way: check liveness every [`POLL_INTERVAL`], give up once the
//! timeout has elapsed or cancellation was requested. Output pipes are drained
//! on background threads meanwhile so a full pipe never stalls the child and
//! partial output survives a timeout. Collecting that output never waits on
//! processes outliving the child for longer than [`DRAIN_GRACE`].

use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::types::CancelToken;

/// Interval between liveness checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why waiting on a child stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child exited on its own
    Exited(ExitStatus),
    /// The timeout elapsed first
    TimedOut,
    /// Cancellation was requested first
    Cancelled,
}

/// Poll `child` until it exits, `timeout` elapses or `cancel` fires.
///
/// A zero timeout waits indefinitely (cancellation still applies).
pub fn wait_for_exit(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancelToken,
) -> std::io::Result<WaitOutcome> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(WaitOutcome::Exited(status));
        }
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        if !timeout.is_zero() && start.elapsed() > timeout {
            return Ok(WaitOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Exit code of a finished process; signal deaths map to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// How long [`OutputCapture::collect`] waits for the pipes to close.
///
/// A descendant that escaped the killed process group (or was backgrounded
/// by a command that exited) can hold the pipes open indefinitely.
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Background readers for a child's stdout and stderr.
pub struct OutputCapture {
    stdout: Option<Reader>,
    stderr: Option<Reader>,
}

struct Reader {
    buf: Buffer,
    handle: JoinHandle<()>,
}

impl OutputCapture {
    /// Take the child's piped stdout/stderr and start draining them.
    pub fn attach(child: &mut Child) -> Self {
        Self {
            stdout: child.stdout.take().map(drain),
            stderr: child.stderr.take().map(drain),
        }
    }

    /// Return what both pipes produced.
    ///
    /// Waits at most [`DRAIN_GRACE`] for the pipes to close; readers still
    /// blocked after that are left detached and their output so far is
    /// returned. Only call this once the child has exited or been killed.
    pub fn collect(self) -> (String, String) {
        let deadline = Instant::now() + DRAIN_GRACE;
        let readers = [self.stdout.as_ref(), self.stderr.as_ref()];
        while readers.iter().flatten().any(|r| !r.handle.is_finished())
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(10));
        }
        (snapshot(self.stdout), snapshot(self.stderr))
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Reader {
    let buf = Buffer::default();
    let sink = Arc::clone(&buf);
    let handle = thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => match sink.lock() {
                    Ok(mut out) => out.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                },
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                // A read error just truncates what we report.
                Err(_) => break,
            }
        }
    });
    Reader { buf, handle }
}

fn snapshot(reader: Option<Reader>) -> String {
    reader
        .and_then(|r| r.buf.lock().ok().map(|out| String::from_utf8_lossy(&out).into_owned()))
        .unwrap_or_default()
}

/// SIGKILL the child's process group and reap the child.
///
/// The child must have been spawned with `process_group(0)`.
pub fn kill_group(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        let _ = child.wait();
        return;
    };
    // SAFETY: the child was spawned with process_group(0), so its pid is the
    // id of a group that contains only it and its descendants.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
    let _ = child.wait();
}
