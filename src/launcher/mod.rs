// src/launcher/mod.rs

//! Pluggable job-launcher abstraction.
//!
//! The engine talks to a `Launcher` trait object instead of a concrete
//! backend. Each backend turns one case spec into an external command or a
//! job script and executes/submits it; the engine never knows the
//! difference. Tests can swap in a fake launcher that doesn't spawn real
//! processes.
//!
//! Backend selection is a priority-ordered table lookup: `auto` probes for
//! each backend's control binary and takes the first hit.

pub mod bsub;
pub mod mpirun;
pub mod pbs;
pub mod process;
pub mod script;
pub mod slurm;
pub mod yhrun;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use clap::ValueEnum;
use tracing::debug;

use crate::cli::CliArgs;
use crate::errors::{BenchrunError, Result};
use crate::project::{CaseSpec, TestCase};

pub use bsub::BsubLauncher;
pub use mpirun::MpirunLauncher;
pub use pbs::PbsLauncher;
pub use slurm::SlurmLauncher;
pub use yhrun::YhrunLauncher;

/// Result of one case run.
///
/// Batch submission paths report `Success` on accepted submission; tracking
/// eventual job completion is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    Failed,
}

impl Outcome {
    /// Exit-code mapping shared by every interactive path: 0 is success,
    /// 124 is the `timeout(1)` convention, anything else failed.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Outcome::Success,
            124 => Outcome::Timeout,
            _ => Outcome::Failed,
        }
    }

    /// Signal death carries no exit code and counts as failed.
    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Outcome::from_exit_code(code),
            None => Outcome::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Timeout => "timeout",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run settings shared by all launcher calls, including the immutable
/// base-environment snapshot taken once at startup. Launchers never touch
/// process-global environment state.
pub struct RunContext<'a> {
    /// Wall-clock bound per case, in minutes. Enforced externally: direct
    /// backends wrap the command, scheduler backends pass a native flag.
    pub timeout: Option<u64>,
    /// Write a `run.sh` reproducing the exact submission into the case dir.
    pub make_script: bool,
    /// Skip execution; only artifact generation may happen.
    pub dry_run: bool,
    /// Tee job output to the terminal in addition to the STDOUT/STDERR files.
    pub verbose: bool,
    pub base_env: &'a BTreeMap<String, String>,
}

/// A job launcher backend.
pub trait Launcher {
    fn name(&self) -> &'static str;

    /// Run or submit one case. Returns `None` only under dry-run.
    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>>;
}

/// Backend selector as exposed on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Mpirun,
    Slurm,
    Pbs,
    Yhrun,
    Bsub,
    Auto,
}

/// Build the launcher selected on the command line.
///
/// An explicitly named backend is constructed without probing (the operator
/// knows their machine); `auto` probes in fixed priority order and fails
/// with instructions when nothing is found.
pub fn select_launcher(args: &CliArgs) -> Result<Box<dyn Launcher>> {
    match args.launcher {
        BackendKind::Mpirun => Ok(Box::new(MpirunLauncher::new(args.mpirun.clone()))),
        BackendKind::Yhrun => Ok(Box::new(YhrunLauncher::new(args.yhrun.clone()))),
        BackendKind::Slurm => Ok(Box::new(SlurmLauncher::new(args.slurm.clone()))),
        BackendKind::Pbs => Ok(Box::new(PbsLauncher::new(args.pbs.clone()))),
        BackendKind::Bsub => Ok(Box::new(BsubLauncher::new(args.bsub.clone()))),
        BackendKind::Auto => {
            if YhrunLauncher::available() {
                Ok(Box::new(YhrunLauncher::new(args.yhrun.clone())))
            } else if BsubLauncher::available() {
                Ok(Box::new(BsubLauncher::new(args.bsub.clone())))
            } else if SlurmLauncher::available() {
                Ok(Box::new(SlurmLauncher::new(args.slurm.clone())))
            } else if PbsLauncher::available() {
                Ok(Box::new(PbsLauncher::new(args.pbs.clone())))
            } else if MpirunLauncher::available() {
                Ok(Box::new(MpirunLauncher::new(args.mpirun.clone())))
            } else {
                Err(BenchrunError::NoLauncher)
            }
        }
    }
}

/// Check whether `program` can be spawned on this host. A spawn error means
/// absent; a non-zero exit (many launchers reject `-h`) still counts as
/// present.
pub(crate) fn has_program(program: &str) -> bool {
    let found = Command::new(program)
        .arg("-h")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok();
    debug!(program, found, "probed for job-control binary");
    found
}

/// Base-environment snapshot overlaid with the case's declared `envs`.
/// Spec values win over inherited ones.
pub(crate) fn case_env(
    base: &BTreeMap<String, String>,
    spec: &CaseSpec,
) -> BTreeMap<String, String> {
    let mut env = base.clone();
    env.extend(spec.env_strings());
    env
}

/// Job name derived from the command: the basename of its first element.
pub(crate) fn job_name(cmd: &[String]) -> String {
    Path::new(&cmd[0])
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cmd[0].clone())
}
