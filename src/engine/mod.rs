// src/engine/mod.rs

//! The orchestration run loop.
//!
//! Strictly sequential: one case at a time, in manifest order, blocking on
//! the launcher for each. Policy is applied per case in a fixed order —
//! exclude, include, rerun-failed validation, skip-finished history — and
//! only then does the launcher run. Outcomes are bucketed into `RunStats`
//! and persisted at the end of the pass for the next run's skip decisions.

pub mod filter;
pub mod report;
pub mod validate;

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::Result;
use crate::launcher::{Launcher, Outcome, RunContext};
use crate::project::{RunStats, TestProject};

pub use filter::CaseFilter;
pub use report::{ConsoleReporter, Reporter};
pub use validate::validate_case;

const RUN_STATS_FILE: &str = "run_stats.json";

/// Per-pass policy and launcher settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Per-case wall-clock bound, in minutes.
    pub timeout: Option<u64>,
    pub make_script: bool,
    pub dry_run: bool,
    pub verbose: bool,
    /// Seconds to sleep between executed cases.
    pub sleep_secs: u64,
    /// Skip cases recorded as successful in the previous run's stats.
    pub skip_finished: bool,
    /// Skip cases whose output already validates; run the rest.
    pub rerun_failed: bool,
}

/// Run one full pass over the project and return the outcome buckets.
///
/// A failing case never aborts the pass; configuration and I/O errors do.
/// Stats are written to `run_stats.json` in the project root unless this is
/// a dry run.
pub fn run_project(
    project: &TestProject,
    launcher: &dyn Launcher,
    reporter: &mut dyn Reporter,
    filter: &CaseFilter,
    opts: &RunOptions,
    base_env: &BTreeMap<String, String>,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    if opts.skip_finished {
        if let Some(last) = &project.last_stats {
            // Carry previously-successful cases forward so skip decisions
            // stay stable across repeated passes.
            stats.success = last.success.clone();
        }
    }

    let ctx = RunContext {
        timeout: opts.timeout,
        make_script: opts.make_script,
        dry_run: opts.dry_run,
        verbose: opts.verbose,
        base_env,
    };

    info!(project = %project.name, cases = project.count_cases(), "starting pass");
    reporter.project_begin(project);

    for case in project.cases() {
        let case = case?;
        let id = case.id();

        if filter.is_excluded(&case.rel_path) {
            stats.skipped.push(id);
            reporter.case_begin(&case);
            reporter.case_end(&case, "skipped since excluded");
            continue;
        }
        if !filter.is_included(&case.rel_path) {
            stats.skipped.push(id);
            reporter.case_begin(&case);
            reporter.case_end(&case, "skipped since not included");
            continue;
        }
        if opts.rerun_failed && validate_case(&case) {
            reporter.case_begin(&case);
            reporter.case_end(&case, "skipped since done");
            continue;
        }
        if opts.skip_finished && stats.success.contains(&id) {
            reporter.case_begin(&case);
            reporter.case_end(&case, "skipped since finished");
            continue;
        }

        reporter.case_begin(&case);
        let outcome = launcher.run(&case, &ctx)?;
        match outcome {
            Some(outcome) => {
                reporter.case_end(&case, outcome.as_str());
                let bucket = match outcome {
                    Outcome::Success => &mut stats.success,
                    Outcome::Timeout => &mut stats.timeout,
                    Outcome::Failed => &mut stats.failed,
                };
                bucket.push(id);
            }
            None => reporter.case_end(&case, "dryrun"),
        }

        if opts.sleep_secs > 0 {
            debug!(seconds = opts.sleep_secs, "sleeping between cases");
            thread::sleep(Duration::from_secs(opts.sleep_secs));
        }
    }

    reporter.project_end(project, &stats);

    if !opts.dry_run {
        stats.save(&project.root().join(RUN_STATS_FILE))?;
    }
    Ok(stats)
}
