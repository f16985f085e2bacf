use anyhow::{Result, bail};
use aptsync::{FleetRunner, TaskSummary, TransportConnector};

use crate::cli::{AptGetArgs, AptTask};
use crate::commands::report::TerminalReporter;
use crate::config;
use crate::ui;
use crate::{Context, RunStatus};

/// Run one apt-get invocation on every host
pub fn run(ctx: &Context, args: &AptGetArgs) -> Result<RunStatus> {
    let needs_packages = matches!(
        args.command,
        AptTask::Install | AptTask::Remove | AptTask::Purge
    );
    if needs_packages && args.packages.is_empty() {
        bail!("apt-get {} needs at least one package", args.command.subcommand());
    }

    let hosts = config::load_hosts(ctx.config.as_deref())?;
    let settings = super::settings(Some(&args.apt), ctx.timeout);
    let subcommand = args.command.subcommand();

    let reporter = TerminalReporter::new(None, ctx.verbose > 0);
    let summary = FleetRunner::new(&settings, TransportConnector, reporter)
        .with_cancel(ctx.cancel.clone())
        .for_each_host(&hosts, |machine| {
            machine.execute_apt(subcommand, &args.packages)
        });

    Ok(finish(ctx, &summary))
}

/// Print the closing line of a fleet task and map it to a run status
pub fn finish(ctx: &Context, summary: &TaskSummary) -> RunStatus {
    if summary.interrupted {
        return RunStatus::Interrupted;
    }
    if !ctx.quiet {
        println!();
        let total = summary.results.len();
        match summary.failed() {
            0 => ui::success(&format!("Done on {total} hosts")),
            failed => ui::warn(&format!("Done on {} of {total} hosts, {failed} failed", total - failed)),
        }
    }
    RunStatus::Completed
}
