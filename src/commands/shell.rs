use anyhow::{Result, bail};
use aptsync::{FleetRunner, TransportConnector};

use crate::commands::apt::finish;
use crate::commands::report::TerminalReporter;
use crate::config;
use crate::{Context, RunStatus};

/// Run an arbitrary shell command on every host
pub fn run(ctx: &Context, shell_command: &str) -> Result<RunStatus> {
    if shell_command.trim().is_empty() {
        bail!("Shell command is empty");
    }

    let hosts = config::load_hosts(ctx.config.as_deref())?;
    let settings = super::settings(None, ctx.timeout);

    let reporter = TerminalReporter::new(None, ctx.verbose > 0);
    let summary = FleetRunner::new(&settings, TransportConnector, reporter)
        .with_cancel(ctx.cancel.clone())
        .for_each_host(&hosts, |machine| machine.execute(shell_command));

    Ok(finish(ctx, &summary))
}
