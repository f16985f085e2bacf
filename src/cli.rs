use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "yarapt")]
#[command(version)]
#[command(about = "Yet another remote apt tool - runs apt tasks across a fleet of hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Force colorized output
    #[arg(short, long, global = true)]
    pub color: bool,

    /// Host file (JSON or TOML); defaults to ./config.json
    #[arg(long, global = true, env = "YARAPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Append log records to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Command timeout in seconds for every host (0 waits forever)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Synchronize your packages between all hosts
    Sync(SyncArgs),

    /// Execute an apt-get command on all hosts
    #[command(name = "apt-get")]
    AptGet(AptGetArgs),

    /// Execute a shell command on all hosts
    Command {
        /// Command line run by the target host's shell
        shell_command: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Package manager flags shared by `sync` and `apt-get`
#[derive(Args, Debug, Clone)]
pub struct AptArgs {
    /// Options given to the package manager, e.g. -y
    #[arg(
        short = 'o',
        long = "apt-options",
        num_args = 1..,
        allow_hyphen_values = true,
        value_name = "OPTION"
    )]
    pub apt_options: Vec<String>,

    /// Package manager executable, e.g. /usr/bin/aptitude
    #[arg(
        short = 'e',
        long = "apt-executable",
        default_value = aptsync::apt::DEFAULT_APT_EXECUTABLE,
        value_name = "COMMAND"
    )]
    pub apt_executable: String,

    /// Simulate only; adds -s to every package manager call
    #[arg(short, long)]
    pub simulate: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub apt: AptArgs,

    /// Show complete package lists instead of truncating them
    #[arg(short = 'l', long)]
    pub full_lists: bool,

    /// Visit reference hosts before all others
    #[arg(long)]
    pub reference_first: bool,
}

#[derive(Args)]
pub struct AptGetArgs {
    /// apt-get command to execute
    #[arg(value_enum)]
    pub command: AptTask,

    /// Packages for install, remove or purge
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,

    #[command(flatten)]
    pub apt: AptArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AptTask {
    Install,
    Remove,
    Purge,
    Update,
    Upgrade,
}

impl AptTask {
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Purge => "purge",
            Self::Update => "update",
            Self::Upgrade => "upgrade",
        }
    }
}
