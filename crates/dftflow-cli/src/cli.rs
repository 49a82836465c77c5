use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "DFTFlow Developers",
    version,
    about = "DFTFlow CLI - Drive frequency, reaction-path (IRC) and single-point stages with checkpoint/resume.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a calculation stage from a TOML run file.
    Run(RunArgs),
    /// Inspect a checkpoint file.
    Checkpoint(CheckpointArgs),
    /// Assess the reaction-path profile stored in a checkpoint.
    Assess(AssessArgs),
}

/// The stage that owns the run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Frequency analysis, gated IRC and single-point refinement.
    Frequency,
    /// Standalone reaction-path trace with optional single-point refinement.
    Irc,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Which stage to run.
    #[arg(value_enum)]
    pub stage: StageKind,

    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the run directory from the config file.
    #[arg(short = 'd', long, value_name = "PATH")]
    pub run_dir: Option<PathBuf>,

    /// Override the input geometry (XYZ).
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Recorded backend results to replay (JSON).
    #[arg(short, long, value_name = "PATH")]
    pub recording: Option<PathBuf>,

    /// Resume from the checkpoint in the run directory.
    #[arg(long)]
    pub resume: bool,

    /// Override `snapshots.interval-steps` from the config file.
    #[arg(long, value_name = "INT")]
    pub snapshot_interval: Option<i64>,

    /// Override `snapshots.mode` (none, last, all).
    #[arg(long, value_name = "MODE")]
    pub snapshot_mode: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S irc.steps=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `checkpoint` subcommand.
#[derive(Args, Debug)]
pub struct CheckpointArgs {
    #[command(subcommand)]
    pub command: CheckpointCommands,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Summarize the progress recorded in a checkpoint.
    Show {
        /// Path to the checkpoint file.
        #[arg(required = true)]
        path: PathBuf,
        /// Print the full record as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for the `assess` subcommand.
#[derive(Args, Debug)]
pub struct AssessArgs {
    /// Path to the checkpoint file holding the profile.
    #[arg(required = true)]
    pub checkpoint: PathBuf,

    /// Write the per-step profile export to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
