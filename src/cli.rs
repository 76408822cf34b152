// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every backend contributes its own flattened option group, with each flag
//! namespaced by the backend name (`--mpirun-hosts`, `--yhrun-partition`, ...)
//! so options never collide. The parsed group structs double as the immutable
//! per-backend launcher configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::launcher::bsub::BsubOpts;
use crate::launcher::mpirun::MpirunOpts;
use crate::launcher::pbs::PbsOpts;
use crate::launcher::slurm::SlurmOpts;
use crate::launcher::yhrun::YhrunOpts;
use crate::launcher::BackendKind;

/// Command-line arguments for `benchrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "benchrun",
    version,
    about = "Run a test project of benchmark cases on HPC job-control systems.",
    long_about = None
)]
pub struct CliArgs {
    /// Root directory of the test project.
    #[arg(value_name = "PROJECT_ROOT")]
    pub project_root: PathBuf,

    /// Skip cases recorded as successful in the previous run.
    #[arg(long)]
    pub skip_finished: bool,

    /// Rerun failed cases, using the case validator to decide what is done.
    #[arg(long)]
    pub rerun_failed: bool,

    /// Excluded case paths, shell wildcards supported. Repeatable.
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Included case paths, shell wildcards supported. Repeatable.
    #[arg(short = 'i', long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Job launcher backend. `auto` picks the first one available on this
    /// host in a fixed priority order (yhrun, bsub, slurm, pbs, mpirun).
    #[arg(long, value_enum, default_value_t = BackendKind::Auto)]
    pub launcher: BackendKind,

    /// Timeout for each case, in minutes.
    #[arg(short = 't', long, value_name = "MINUTES")]
    pub timeout: Option<u64>,

    /// Sleep the specified seconds between cases.
    #[arg(long, default_value_t = 0, value_name = "SECONDS")]
    pub sleep: u64,

    /// Generate a job script (`run.sh`) for each case.
    #[arg(long)]
    pub make_script: bool,

    /// Don't actually run cases.
    #[arg(long)]
    pub dryrun: bool,

    /// Tee job output to the terminal in addition to the per-case
    /// STDOUT/STDERR files.
    #[arg(long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BENCHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(flatten)]
    pub mpirun: MpirunOpts,

    #[command(flatten)]
    pub yhrun: YhrunOpts,

    #[command(flatten)]
    pub slurm: SlurmOpts,

    #[command(flatten)]
    pub pbs: PbsOpts,

    #[command(flatten)]
    pub bsub: BsubOpts,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
