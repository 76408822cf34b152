// src/lib.rs

pub mod cli;
pub mod engine;
pub mod errors;
pub mod launcher;
pub mod logging;
pub mod project;

use std::collections::BTreeMap;

use tracing::info;

use crate::cli::CliArgs;
use crate::engine::{CaseFilter, ConsoleReporter, RunOptions};
use crate::errors::Result;
use crate::project::TestProject;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - project loading (all configuration errors surface here, before any
///   case runs)
/// - launcher backend selection
/// - filter / reporter / run-loop plumbing
///
/// A completed pass is success from the process's point of view, whatever
/// the per-case outcomes were.
pub fn run(args: CliArgs) -> Result<()> {
    let project = TestProject::open(&args.project_root)?;
    let launcher = launcher::select_launcher(&args)?;
    info!(
        launcher = launcher.name(),
        project = %project.name,
        "selected job launcher"
    );

    let filter = CaseFilter::new(&args.exclude, &args.include)?;

    // One immutable snapshot of the inherited environment for the whole
    // pass; launchers overlay case envs onto this, never onto the process.
    let base_env: BTreeMap<String, String> = std::env::vars().collect();

    let opts = RunOptions {
        timeout: args.timeout,
        make_script: args.make_script,
        dry_run: args.dryrun,
        verbose: args.verbose,
        sleep_secs: args.sleep,
        skip_finished: args.skip_finished,
        rerun_failed: args.rerun_failed,
    };

    let mut reporter = ConsoleReporter::new();
    engine::run_project(
        &project,
        launcher.as_ref(),
        &mut reporter,
        &filter,
        &opts,
        &base_env,
    )?;
    Ok(())
}
