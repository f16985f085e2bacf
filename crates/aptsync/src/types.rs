//! Package selection state as tracked by dpkg

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A package's desired install disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionState {
    /// Wanted installed
    Install,
    /// Removed, configuration kept
    Deinstall,
    /// Removed together with its configuration
    Purge,
    /// Installed and pinned at its version
    Hold,
    /// Anything else dpkg reports
    Unknown,
}

impl SelectionState {
    /// The word dpkg uses for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Deinstall => "deinstall",
            Self::Purge => "purge",
            Self::Hold => "hold",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for SelectionState {
    type Err = std::convert::Infallible;

    /// Anything dpkg reports that we do not model maps to `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "install" => Self::Install,
            "deinstall" => Self::Deinstall,
            "purge" => Self::Purge,
            "hold" => Self::Hold,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of one host's package selections
///
/// Each name carries exactly one state. The snapshot is never mutated after
/// capture; build a new one instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageState {
    packages: BTreeMap<String, SelectionState>,
}

impl PackageState {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packages in the snapshot
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the host reported no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// State of `name`, if the host knows it
    pub fn get(&self, name: &str) -> Option<SelectionState> {
        self.packages.get(name).copied()
    }

    /// Names currently in `state`
    pub fn with_state(&self, state: SelectionState) -> BTreeSet<&str> {
        self.packages
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Iterate `(name, state)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, SelectionState)> {
        self.packages.iter().map(|(name, state)| (name.as_str(), *state))
    }
}

/// Later entries win when a name repeats
impl<S: Into<String>> FromIterator<(S, SelectionState)> for PackageState {
    fn from_iter<I: IntoIterator<Item = (S, SelectionState)>>(iter: I) -> Self {
        Self {
            packages: iter
                .into_iter()
                .map(|(name, state)| (name.into(), state))
                .collect(),
        }
    }
}
