//! Reading a host's package selections

use hostexec::{Executor, Result};

use crate::types::{PackageState, SelectionState};

/// Lists every package as `"<name> <state>"`, one per line.
pub const SELECTIONS_QUERY: &str = "/usr/bin/dpkg --get-selections | /usr/bin/awk '{print $1, $2};'";

/// Prints the operating system label, e.g. `Debian GNU/Linux 12 (bookworm)`.
pub const DISTRIBUTION_QUERY: &str = "/usr/bin/lsb_release -ds";

/// Fetch the full selection table of the host behind `executor`.
pub fn fetch_state(executor: &mut Executor) -> Result<PackageState> {
    log::debug!("Fetching package selections from {}", executor.host());
    let output = executor.execute(SELECTIONS_QUERY)?;
    Ok(parse_selections(&output))
}

/// Best-effort operating system label; empty when it cannot be determined.
pub fn fetch_distribution(executor: &mut Executor) -> String {
    match executor.execute(DISTRIBUTION_QUERY) {
        Ok(label) => label,
        Err(e) => {
            log::info!(
                "Could not determine distribution of {}: {}",
                executor.host(),
                e
            );
            String::new()
        }
    }
}

/// Parse `"<name> <state>"` lines into a snapshot.
///
/// Blank lines are dropped. Lines that do not split into exactly two fields
/// are skipped with a diagnostic; they never fail the parse.
pub fn parse_selections(output: &str) -> PackageState {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, state] => {
                    let parsed = state.parse().unwrap_or(SelectionState::Unknown);
                    if parsed == SelectionState::Unknown && *state != "unknown" {
                        log::debug!("Package {name} has unrecognised state {state:?}");
                    }
                    Some((*name, parsed))
                }
                _ => {
                    log::info!("Error with package {fields:?}");
                    None
                }
            }
        })
        .collect()
}
