//! Host records and run-wide sync settings

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::apt::{AptCommand, DEFAULT_APT_EXECUTABLE, DEFAULT_HOLD_COMMAND};

/// Problems with the host file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The host file could not be read
    #[error("failed to read host file {}: {source}", .path.display())]
    Read {
        /// Host file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The host file is not valid JSON for a host list
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        /// Host file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The host file is not valid TOML for a host list
    #[error("invalid TOML in {}: {source}", .path.display())]
    Toml {
        /// Host file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// The host file parsed but names no hosts
    #[error("host file {} lists no hosts", .path.display())]
    Empty {
        /// Host file path
        path: PathBuf,
    },

    /// A host entry has a blank `host`
    #[error("host entry #{index} has an empty host name")]
    MissingHost {
        /// Zero-based position in the host list
        index: usize,
    },
}

/// Result type for host file loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// One fleet member, as written in the host file
///
/// Immutable once loaded.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Host name or address; also the label in output
    pub host: String,
    /// SSH login name
    #[serde(default)]
    pub username: Option<String>,
    /// SSH password, used when no key is given
    #[serde(default)]
    pub password: Option<String>,
    /// Private key path; `~` is expanded on use
    #[serde(default)]
    pub private_key: Option<String>,
    /// SSH port
    #[serde(default)]
    pub port: Option<u16>,
    /// Run every command through sudo
    #[serde(default)]
    pub sudo: bool,
    /// This host's selections are the ones the fleet follows
    #[serde(default)]
    pub reference: bool,
    /// Reach the host over SSH instead of running locally
    #[serde(default)]
    pub ssh: bool,
    /// Package manager executable for this host only
    #[serde(default)]
    pub apt_command: Option<String>,
}

impl HostConfig {
    /// Local, non-reference host named `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Expanded private key path, if one is configured
    pub fn key_path(&self) -> Option<PathBuf> {
        self.private_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| PathBuf::from(shellexpand::tilde(key).as_ref()))
    }

    /// `user@host` when a username is set
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(user) if self.ssh => format!("{user}@{}", self.host),
            _ => self.host.clone(),
        }
    }
}

// Keeps passwords out of logs.
impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("private_key", &self.private_key)
            .field("port", &self.port)
            .field("sudo", &self.sudo)
            .field("reference", &self.reference)
            .field("ssh", &self.ssh)
            .field("apt_command", &self.apt_command)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonHostFile {
    List(Vec<HostConfig>),
    Table { hosts: Vec<HostConfig> },
}

#[derive(Deserialize)]
struct TomlHostFile {
    #[serde(default)]
    hosts: Vec<HostConfig>,
}

/// Load the ordered host list from a JSON or TOML file
///
/// `.toml` files are read as `[[hosts]]` tables; anything else as JSON,
/// either a bare array or `{ "hosts": [...] }`.
pub fn load_hosts(path: &Path) -> Result<Vec<HostConfig>> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let hosts = if is_toml {
        toml::from_str::<TomlHostFile>(&content)
            .map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?
            .hosts
    } else {
        match serde_json::from_str::<JsonHostFile>(&content).map_err(|source| {
            ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }
        })? {
            JsonHostFile::List(hosts) | JsonHostFile::Table { hosts } => hosts,
        }
    };

    if hosts.is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }
    if let Some(index) = hosts.iter().position(|h| h.host.trim().is_empty()) {
        return Err(ConfigError::MissingHost { index: index + 1 });
    }

    let references = hosts.iter().filter(|h| h.reference).count();
    log::debug!(
        "Loaded {} hosts ({} reference) from {}",
        hosts.len(),
        references,
        path.display()
    );
    Ok(hosts)
}

/// Settings shared by every host in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Package manager used unless a host overrides it
    pub apt_executable: String,
    /// Options passed before every subcommand
    pub apt_options: Vec<String>,
    /// Only report what would change
    pub simulate: bool,
    /// Command prefix used to hold packages
    pub hold_command: String,
    /// Per-command timeout on local hosts; zero waits forever
    pub local_timeout: Duration,
    /// Per-command timeout on SSH hosts; zero waits forever
    pub remote_timeout: Duration,
    /// Visit reference hosts before any replica
    pub reference_first: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            apt_executable: DEFAULT_APT_EXECUTABLE.to_string(),
            apt_options: Vec::new(),
            simulate: false,
            hold_command: DEFAULT_HOLD_COMMAND.to_string(),
            local_timeout: hostexec::DEFAULT_LOCAL_TIMEOUT,
            remote_timeout: hostexec::DEFAULT_SSH_TIMEOUT,
            reference_first: false,
        }
    }
}

impl SyncSettings {
    /// Package manager invocation for `host`, honouring its override
    pub fn apt_command_for(&self, host: &HostConfig) -> AptCommand {
        let executable = host
            .apt_command
            .as_deref()
            .filter(|exe| !exe.trim().is_empty())
            .unwrap_or(&self.apt_executable);
        AptCommand::new(executable)
            .with_options(self.apt_options.clone())
            .with_simulate(self.simulate)
    }

    /// Command timeout for `host`'s transport
    pub fn timeout_for(&self, host: &HostConfig) -> Duration {
        if host.ssh {
            self.remote_timeout
        } else {
            self.local_timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json_array() {
        let file = write_file(
            ".json",
            r#"[
                {"host": "ref", "reference": true, "ssh": true, "username": "root", "private_key": "~/.ssh/id_rsa"},
                {"host": "web1", "ssh": true, "username": "deploy", "password": "secret", "sudo": true},
                {"host": "localhost"}
            ]"#,
        );
        let hosts = load_hosts(file.path()).unwrap();
        assert_eq!(hosts.len(), 3);
        assert!(hosts[0].reference);
        assert!(hosts[1].sudo);
        assert_eq!(hosts[1].password.as_deref(), Some("secret"));
        assert!(!hosts[2].ssh);
        assert!(!hosts[2].reference);
    }

    #[test]
    fn test_load_json_table() {
        let file = write_file(".json", r#"{"hosts": [{"host": "a"}, {"host": "b"}]}"#);
        let hosts = load_hosts(file.path()).unwrap();
        let names: Vec<_> = hosts.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_load_toml() {
        let file = write_file(
            ".toml",
            r#"
[[hosts]]
host = "ref"
reference = true
ssh = true
port = 2222

[[hosts]]
host = "web1"
apt_command = "/usr/bin/aptitude"
"#,
        );
        let hosts = load_hosts(file.path()).unwrap();
        assert_eq!(hosts[0].port, Some(2222));
        assert_eq!(hosts[1].apt_command.as_deref(), Some("/usr/bin/aptitude"));
    }

    #[test]
    fn test_empty_host_file_is_rejected() {
        let file = write_file(".json", "[]");
        assert!(matches!(load_hosts(file.path()), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_blank_host_name_is_rejected() {
        let file = write_file(".json", r#"[{"host": "a"}, {"host": " "}]"#);
        assert!(matches!(
            load_hosts(file.path()),
            Err(ConfigError::MissingHost { index: 2 })
        ));
    }

    #[test]
    fn test_invalid_json_names_the_file() {
        let file = write_file(".json", "{not json");
        let err = load_hosts(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_file() {
        let err = load_hosts(Path::new("/nonexistent/yarapt/hosts.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_key_path_expands_tilde() {
        let mut host = HostConfig::new("web1");
        assert!(host.key_path().is_none());
        host.private_key = Some("~/.ssh/id_ed25519".to_string());
        let path = host.key_path().unwrap();
        assert!(!path.starts_with("~"));
        assert!(path.ends_with(".ssh/id_ed25519"));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut host = HostConfig::new("web1");
        host.password = Some("hunter2".to_string());
        let debug = format!("{host:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
    }

    #[test]
    fn test_apt_command_override_and_timeouts() {
        let settings = SyncSettings {
            simulate: true,
            ..Default::default()
        };
        let mut host = HostConfig::new("web1");
        assert_eq!(
            settings.apt_command_for(&host).render::<&str>("update", &[]),
            "/usr/bin/apt-get -s update"
        );
        assert_eq!(settings.timeout_for(&host), hostexec::DEFAULT_LOCAL_TIMEOUT);

        host.apt_command = Some("aptitude".to_string());
        host.ssh = true;
        assert_eq!(
            settings.apt_command_for(&host).render::<&str>("update", &[]),
            "aptitude -s update"
        );
        assert_eq!(settings.timeout_for(&host), hostexec::DEFAULT_SSH_TIMEOUT);
    }
}
