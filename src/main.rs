mod cli;
mod commands;
mod config;
mod interrupt;
mod progress;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use hostexec::CancelToken;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub cancel: CancelToken,
}

/// How a fleet command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

fn init_logging(cli: &Cli) -> Result<()> {
    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(if cli.quiet {
        log::LevelFilter::Error
    } else {
        log_level
    });

    match &cli.log_file {
        Some(path) => {
            builder
                .target(env_logger::Target::Pipe(Box::new(open_log_file(path)?)))
                .format_timestamp_secs()
                .write_style(env_logger::WriteStyle::Never);
        }
        None => {
            builder.format_timestamp(None);
        }
    }

    builder.init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    // Colour when stdout is a terminal, or always with -c
    if cli.color {
        colored::control::set_override(true);
    } else if !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        timeout: cli.timeout,
        cancel: interrupt::install(),
    };

    let status = match cli.command {
        Command::Sync(args) => commands::sync::run(&ctx, &args)?,
        Command::AptGet(args) => commands::apt::run(&ctx, &args)?,
        Command::Command { shell_command } => commands::shell::run(&ctx, &shell_command)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "yarapt", &mut io::stdout());
            RunStatus::Completed
        }
    };

    if status == RunStatus::Interrupted {
        ui::error("Interrupted by user");
        std::process::exit(interrupt::EXIT_INTERRUPTED);
    }
    Ok(())
}
