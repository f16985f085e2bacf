use anyhow::{Context, Result, bail};
use aptsync::HostConfig;
use std::path::{Path, PathBuf};

/// File name looked up when no host file is given
pub const CONFIG_FILE: &str = "config.json";

/// Get the per-user config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("yarapt"))
}

/// Candidate host files, in lookup order
fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    paths
}

/// Resolve the host file: the explicit path if given, else the first
/// candidate that exists
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        return Ok(PathBuf::from(expanded));
    }

    let candidates = candidates();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    bail!(
        "No host file found (tried {}). Pass one with --config",
        tried.join(", ")
    )
}

/// Load the ordered host list
pub fn load_hosts(explicit: Option<&Path>) -> Result<Vec<HostConfig>> {
    let path = locate(explicit)?;
    log::info!("Loading hosts from {}", path.display());
    aptsync::load_hosts(&path).with_context(|| format!("Could not load hosts from {}", path.display()))
}
