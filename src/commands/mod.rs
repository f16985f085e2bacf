// Fleet commands
pub mod apt;
pub mod shell;
pub mod sync;

// Terminal output for fleet runs
mod report;

use aptsync::SyncSettings;
use std::time::Duration;

use crate::cli::AptArgs;

/// Run-wide settings from the command line
///
/// `--timeout` replaces both the local and the SSH default.
pub fn settings(apt: Option<&AptArgs>, timeout: Option<u64>) -> SyncSettings {
    let mut settings = SyncSettings::default();
    if let Some(apt) = apt {
        settings.apt_executable = apt.apt_executable.clone();
        settings.apt_options = apt.apt_options.clone();
        settings.simulate = apt.simulate;
    }
    if let Some(secs) = timeout {
        settings.local_timeout = Duration::from_secs(secs);
        settings.remote_timeout = Duration::from_secs(secs);
    }
    settings
}
