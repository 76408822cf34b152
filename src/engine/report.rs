// src/engine/report.rs

//! Progress reporting.
//!
//! The engine drives a `Reporter` through a strict single-threaded
//! sequence: `project_begin`, then `case_begin`/`case_end` pairs in
//! iteration order, then `project_end`. Reporters write to stdout; all
//! diagnostic logging stays on stderr via `tracing`.

use std::io::Write;

use crate::project::{RunStats, TestCase, TestProject};

pub trait Reporter {
    fn project_begin(&mut self, project: &TestProject);
    fn case_begin(&mut self, case: &TestCase);
    fn case_end(&mut self, case: &TestCase, result: &str);
    fn project_end(&mut self, project: &TestProject, stats: &RunStats);
}

/// Console reporter printing a running percentage per case and a bucket
/// summary at the end.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    total_cases: usize,
    finished_cases: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn project_begin(&mut self, project: &TestProject) {
        println!("Start project {}:", project.name);
        self.total_cases = project.count_cases();
        self.finished_cases = 0;
    }

    fn case_begin(&mut self, case: &TestCase) {
        self.finished_cases += 1;
        let completed = self.finished_cases as f64 / self.total_cases.max(1) as f64 * 100.0;
        print!("   [{completed:3.0}%] Run {} ... ", case.rel_path);
        let _ = std::io::stdout().flush();
    }

    fn case_end(&mut self, _case: &TestCase, result: &str) {
        println!("{result}");
    }

    fn project_end(&mut self, _project: &TestProject, stats: &RunStats) {
        println!("Done.");
        println!(
            "{} success, {} timeout, {} failed, {} skipped",
            stats.success.len(),
            stats.timeout.len(),
            stats.failed.len(),
            stats.skipped.len()
        );
    }
}
