//! Sync planner - derives corrective operations from two snapshots

use std::collections::BTreeSet;

use crate::types::{PackageState, SelectionState};

/// Corrective operations that move a replica towards the reference
///
/// The maintenance commands (`update` before, `autoremove`, `clean`,
/// `autoclean` after) are fixed and live in the executor's phase list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Wanted installed by the reference, not marked install here
    pub to_install: BTreeSet<String>,
    /// Deinstalled on the reference, still marked install here
    pub to_remove: BTreeSet<String>,
    /// Purged on the reference, still marked install here
    pub to_purge: BTreeSet<String>,
    /// Held on the reference, not held here
    pub to_hold: BTreeSet<String>,
}

impl SyncPlan {
    /// Compare `replica` against `reference`
    pub fn derive(reference: &PackageState, replica: &PackageState) -> Self {
        let own_install = replica.with_state(SelectionState::Install);

        Self {
            to_install: missing(reference, replica, SelectionState::Install),
            to_remove: moved_away_from_install(
                reference,
                replica,
                SelectionState::Deinstall,
                &own_install,
            ),
            to_purge: moved_away_from_install(
                reference,
                replica,
                SelectionState::Purge,
                &own_install,
            ),
            to_hold: missing(reference, replica, SelectionState::Hold),
        }
    }

    /// Whether no package needs to change
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty()
            && self.to_remove.is_empty()
            && self.to_purge.is_empty()
            && self.to_hold.is_empty()
    }

    /// Total number of package operations
    pub fn len(&self) -> usize {
        self.to_install.len() + self.to_remove.len() + self.to_purge.len() + self.to_hold.len()
    }
}

/// `ref[state] − own[state]`
fn missing(
    reference: &PackageState,
    replica: &PackageState,
    state: SelectionState,
) -> BTreeSet<String> {
    let own = replica.with_state(state);
    reference
        .with_state(state)
        .difference(&own)
        .map(|name| (*name).to_string())
        .collect()
}

/// `(ref[state] − own[state]) ∩ own[install]`
fn moved_away_from_install(
    reference: &PackageState,
    replica: &PackageState,
    state: SelectionState,
    own_install: &BTreeSet<&str>,
) -> BTreeSet<String> {
    let own = replica.with_state(state);
    reference
        .with_state(state)
        .difference(&own)
        .filter(|name| own_install.contains(*name))
        .map(|name| (*name).to_string())
        .collect()
}
