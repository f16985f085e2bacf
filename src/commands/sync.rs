use anyhow::Result;
use aptsync::{FleetRunner, FleetSummary, HostOutcome, TransportConnector};

use crate::cli::SyncArgs;
use crate::commands::report::TerminalReporter;
use crate::config;
use crate::ui;
use crate::{Context, RunStatus};

pub fn run(ctx: &Context, args: &SyncArgs) -> Result<RunStatus> {
    let hosts = config::load_hosts(ctx.config.as_deref())?;
    let mut settings = super::settings(Some(&args.apt), ctx.timeout);
    settings.reference_first = args.reference_first;

    ui::header(&format!("Synchronizing {} hosts", hosts.len()));
    if settings.simulate {
        ui::warn("Simulate mode: package changes are only reported, holds are still applied");
    }

    let list_limit = (!args.full_lists).then_some(ui::LIST_LIMIT);
    let reporter = TerminalReporter::new(list_limit, ctx.verbose > 0);
    let summary = FleetRunner::new(&settings, TransportConnector, reporter)
        .with_cancel(ctx.cancel.clone())
        .run(&hosts);

    if !ctx.quiet {
        print_summary(&summary);
    }

    Ok(if summary.interrupted {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    })
}

/// One-line verdict for a host
fn describe(outcome: &HostOutcome) -> String {
    match outcome {
        HostOutcome::Reference { packages } => format!("reference ({packages} packages)"),
        HostOutcome::Synced { plan, summary } => {
            let failed = summary.failures().count();
            let mut text = format!("synced ({} package changes", plan.len());
            if failed > 0 {
                text.push_str(&format!(", {failed} failed phases"));
            }
            if summary.interrupted {
                text.push_str(", interrupted");
            }
            text.push(')');
            text
        }
        HostOutcome::NoReference => "skipped (no reference yet)".to_string(),
        HostOutcome::Failed(error) if error.is_interrupt() => "interrupted".to_string(),
        HostOutcome::Failed(_) => "failed".to_string(),
    }
}

fn print_summary(summary: &FleetSummary) {
    ui::header("Summary");
    for report in &summary.hosts {
        ui::kv(&report.host, &describe(&report.outcome));
    }
    println!();
    if summary.failed() == 0 && !summary.interrupted {
        ui::success(&format!("{} hosts synchronized", summary.synced()));
    } else {
        ui::warn(&format!(
            "{} hosts synchronized, {} failed",
            summary.synced(),
            summary.failed()
        ));
    }
}
