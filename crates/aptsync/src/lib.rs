//! # aptsync
//!
//! Keep dpkg package selections consistent across a fleet of hosts. One host
//! is the reference; every other host is driven towards its install, remove,
//! purge and hold state by issuing package-manager commands through
//! [`hostexec`].
//!
//! ## Flow
//!
//! ```text
//! FleetRunner ─ per host ─▶ Connector ─▶ Machine
//!                              │
//!          fetch_state ◀───────┤
//!               │              │
//!      SyncPlan::derive ──▶ apply (update, install, remove, purge,
//!                                  hold, autoremove, clean, autoclean)
//! ```
//!
//! Phases are best-effort: a failed phase is reported through the
//! [`SyncReporter`] and the next phase still runs. Hosts are processed one
//! at a time and a failing host never stops the fleet; only an interrupt
//! does.

#![warn(missing_docs)]

pub mod apt;
pub mod config;
pub mod context;
pub mod executor;
pub mod fleet;
pub mod machine;
pub mod planner;
pub mod query;
pub mod types;

pub use apt::AptCommand;
pub use config::{ConfigError, HostConfig, SyncSettings, load_hosts};
pub use context::{NoReport, SyncReporter};
pub use executor::{Phase, PhaseOutcome, SyncSummary, apply};
pub use fleet::{
    Connector, FleetRunner, FleetSummary, HostOutcome, HostReport, TaskSummary,
    TransportConnector,
};
pub use machine::Machine;
pub use planner::SyncPlan;
pub use query::{fetch_state, parse_selections};
pub use types::{PackageState, SelectionState};
