//! SSH transport over a persistent OpenSSH control master.
//!
//! Connecting starts a backgrounded `ssh -M` master on a private control
//! socket; every command is then multiplexed over that one authenticated
//! session with `ssh -S`. Closing (explicitly or on drop) asks the master to
//! exit.
//!
//! On timeout only the local multiplexing client is killed. The command keeps
//! running on the remote host; there is no way to reach it from here.

use std::fs::{self, File};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::backend::Transport;
use crate::error::{Error, Result};
use crate::poll::{OutputCapture, WaitOutcome, exit_code, kill_group, wait_for_exit};
use crate::types::{CancelToken, ExecutionResult, TransportKind};

/// Default time allowed for establishing the session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to open an SSH session.
#[derive(Debug, Clone)]
pub struct SshTarget {
    /// Host name or address
    pub host: String,
    /// Port; `None` leaves it to ssh (usually 22)
    pub port: Option<u16>,
    /// Login name; `None` lets ssh use the current user
    pub username: Option<String>,
    /// Private key file passed with `-i`
    pub identity_file: Option<PathBuf>,
    /// Password, handed to `sshpass` through the environment
    pub password: Option<String>,
    /// Time allowed for the session handshake
    pub connect_timeout: Duration,
}

impl SshTarget {
    /// Target `host` with ssh defaults for everything else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            identity_file: None,
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Log in as `username`.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Connect to `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Authenticate with the private key at `path`.
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Authenticate with a password via `sshpass`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// `user@host`, or just `host` without a username.
    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Arguments for the backgrounded control master.
    fn master_args(&self, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-M".to_string(),
            "-N".to_string(),
            "-f".to_string(),
            "-S".to_string(),
            control_path.display().to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ];
        if self.password.is_some() {
            args.extend(["-o".to_string(), "NumberOfPasswordPrompts=1".to_string()]);
        } else {
            args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        }
        if let Some(port) = self.port {
            args.extend(["-p".to_string(), port.to_string()]);
        }
        if let Some(identity) = &self.identity_file {
            args.extend(["-i".to_string(), identity.display().to_string()]);
        }
        args.push(self.destination());
        args
    }

    /// Arguments for one command multiplexed over the master.
    fn run_args(&self, control_path: &Path, command: &str) -> Vec<String> {
        vec![
            "-S".to_string(),
            control_path.display().to_string(),
            "-o".to_string(),
            "ControlMaster=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            self.destination(),
            "--".to_string(),
            command.to_string(),
        ]
    }

    /// Arguments asking the master to shut down.
    fn exit_args(&self, control_path: &Path) -> Vec<String> {
        vec![
            "-S".to_string(),
            control_path.display().to_string(),
            "-O".to_string(),
            "exit".to_string(),
            self.destination(),
        ]
    }
}

/// Transport running commands over a persistent SSH session.
pub struct SshTransport {
    target: SshTarget,
    control_path: PathBuf,
    // Keeps the socket directory alive for the session's lifetime.
    control_dir: TempDir,
    open: bool,
}

impl SshTransport {
    /// Authenticate and open the session.
    pub fn connect(target: SshTarget, cancel: &CancelToken) -> Result<Self> {
        let control_dir = tempfile::Builder::new().prefix("yarapt-ssh").tempdir()?;
        let control_path = control_dir.path().join("mux");
        let log_path = control_dir.path().join("master.log");

        log::info!("Connecting to ssh://{}", target.destination());

        // The master forks into the background and keeps its stderr, so it
        // goes to a file rather than a pipe we would wait on forever.
        let mut command = if let Some(password) = &target.password {
            let mut c = Command::new("sshpass");
            c.arg("-e").arg("ssh").env("SSHPASS", password);
            c
        } else {
            Command::new("ssh")
        };
        let mut child = command
            .args(target.master_args(&control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(File::create(&log_path)?)
            .process_group(0)
            .spawn()
            .map_err(|e| Error::Connection {
                host: target.host.clone(),
                message: format!("failed to start ssh: {e}"),
            })?;

        // ssh enforces ConnectTimeout itself; the extra margin covers auth.
        let limit = target.connect_timeout + Duration::from_secs(5);
        let outcome = wait_for_exit(&mut child, limit, cancel)?;
        let failure = match outcome {
            WaitOutcome::Exited(status) if status.success() => None,
            WaitOutcome::Exited(status) => {
                let log = fs::read_to_string(&log_path).unwrap_or_default();
                let log = log.trim();
                Some(if log.is_empty() {
                    format!("ssh exited with status {}", exit_code(status))
                } else {
                    log.to_string()
                })
            }
            WaitOutcome::TimedOut => {
                kill_group(&mut child);
                Some(format!(
                    "no session after {} seconds",
                    limit.as_secs()
                ))
            }
            WaitOutcome::Cancelled => {
                kill_group(&mut child);
                return Err(Error::Interrupted {
                    command: format!("ssh {}", target.destination()),
                    host: target.host.clone(),
                });
            }
        };

        if let Some(message) = failure {
            log::error!("Could not connect to {}: {}", target.destination(), message);
            return Err(Error::Connection {
                host: target.host,
                message,
            });
        }

        Ok(Self {
            target,
            control_path,
            control_dir,
            open: true,
        })
    }

    /// The target this session was opened against.
    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

impl Transport for SshTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }

    fn host(&self) -> &str {
        &self.target.host
    }

    fn run(
        &mut self,
        command: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        if !self.open {
            return Err(Error::Connection {
                host: self.target.host.clone(),
                message: "session already closed".to_string(),
            });
        }

        let start = Instant::now();
        let mut child = Command::new("ssh")
            .args(self.target.run_args(&self.control_path, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;

        let capture = OutputCapture::attach(&mut child);
        let outcome = wait_for_exit(&mut child, timeout, cancel);
        let exit_status = match outcome {
            Ok(WaitOutcome::Exited(status)) => Some(exit_code(status)),
            Ok(WaitOutcome::TimedOut) => {
                kill_group(&mut child);
                None
            }
            Ok(WaitOutcome::Cancelled) => {
                kill_group(&mut child);
                let _ = capture.collect();
                return Err(Error::Interrupted {
                    command: command.to_string(),
                    host: self.target.host.clone(),
                });
            }
            Err(e) => {
                kill_group(&mut child);
                return Err(e.into());
            }
        };

        let (stdout, stderr) = capture.collect();
        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_status,
            elapsed: start.elapsed(),
        })
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        log::debug!(
            "Closing ssh session to {} ({})",
            self.target.destination(),
            self.control_dir.path().display()
        );
        let status = Command::new("ssh")
            .args(self.target.exit_args(&self.control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if !status.success() {
            log::warn!(
                "ssh master for {} did not acknowledge exit (status {})",
                self.target.destination(),
                exit_code(status)
            );
        }
        Ok(())
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close ssh session to {}: {}", self.target.host, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        assert_eq!(SshTarget::new("web1").destination(), "web1");
        assert_eq!(
            SshTarget::new("web1").with_username("deploy").destination(),
            "deploy@web1"
        );
    }

    #[test]
    fn test_master_args_with_key() {
        let target = SshTarget::new("db1")
            .with_username("root")
            .with_port(2222)
            .with_identity_file("/keys/id_rsa");
        let args = target.master_args(Path::new("/tmp/s/mux"));
        assert_eq!(&args[..5], ["-M", "-N", "-f", "-S", "/tmp/s/mux"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_rsa"]));
        assert_eq!(args.last().map(String::as_str), Some("root@db1"));
    }

    #[test]
    fn test_master_args_with_password_allow_prompt() {
        let target = SshTarget::new("db1").with_password("hunter2");
        let args = target.master_args(Path::new("/tmp/s/mux"));
        assert!(!args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"NumberOfPasswordPrompts=1".to_string()));
        // The password itself never appears on the command line.
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[test]
    fn test_run_args_pass_command_as_single_argument() {
        let target = SshTarget::new("db1").with_username("root");
        let args = target.run_args(Path::new("/tmp/s/mux"), "dpkg --get-selections | awk '{print $1}'");
        assert_eq!(
            args[args.len() - 3..],
            [
                "root@db1".to_string(),
                "--".to_string(),
                "dpkg --get-selections | awk '{print $1}'".to_string()
            ]
        );
    }

    #[test]
    fn test_exit_args() {
        let target = SshTarget::new("db1");
        assert_eq!(
            target.exit_args(Path::new("/tmp/s/mux")),
            ["-S", "/tmp/s/mux", "-O", "exit", "db1"]
        );
    }
}
