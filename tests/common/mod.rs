// tests/common/mod.rs

#![allow(dead_code)]

//! Shared fixtures: on-disk test projects built in temp dirs, plus a fake
//! launcher that records calls and returns scripted outcomes instead of
//! spawning real processes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{json, Value};

use benchrun::errors::Result;
use benchrun::launcher::{Launcher, Outcome, RunContext};
use benchrun::project::{RunStats, TestCase, TestProject};

/// Write a minimal one-factor project manifest declaring `cases` in order.
pub fn write_manifest(root: &Path, cases: &[&str]) {
    let entries: Vec<Value> = cases
        .iter()
        .map(|path| json!({"test_vector": {"case": path}, "path": path}))
        .collect();
    let manifest = json!({
        "version": 1,
        "name": "demo-project",
        "test_factors": ["case"],
        "data_files": [],
        "test_cases": entries,
    });
    fs::write(
        root.join("TestProject.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// Create a case directory with the given `TestCase.json` content.
pub fn write_case(root: &Path, rel: &str, spec: &Value) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("TestCase.json"),
        serde_json::to_string_pretty(spec).unwrap(),
    )
    .unwrap();
}

/// A spec that would run `echo ok` on `nprocs` processes.
pub fn simple_spec(nprocs: u64) -> Value {
    json!({
        "cmd": ["echo", "ok"],
        "envs": {},
        "run": {"nprocs": nprocs},
        "results": []
    })
}

/// Build a complete project with the given cases, all using `simple_spec`.
pub fn write_project(root: &Path, cases: &[&str]) {
    write_manifest(root, cases);
    for rel in cases {
        write_case(root, rel, &simple_spec(2));
    }
}

pub fn base_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

pub fn open(root: &Path) -> TestProject {
    TestProject::open(root).expect("project should open")
}

/// Fake launcher: records which cases it was asked to run and returns the
/// scripted outcome per case path (default `Success`). Honours the dry-run
/// contract by returning `None` without side effects.
pub struct FakeLauncher {
    outcomes: HashMap<String, Outcome>,
    calls: Mutex<Vec<String>>,
}

impl FakeLauncher {
    pub fn all_success() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outcome(mut self, rel_path: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(rel_path.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Launcher for FakeLauncher {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        self.calls.lock().unwrap().push(case.rel_path.clone());
        if ctx.dry_run {
            return Ok(None);
        }
        Ok(Some(
            self.outcomes
                .get(&case.rel_path)
                .copied()
                .unwrap_or(Outcome::Success),
        ))
    }
}

/// Reporter that swallows everything; policy tests only care about stats.
pub struct NullReporter;

impl benchrun::engine::Reporter for NullReporter {
    fn project_begin(&mut self, _project: &TestProject) {}
    fn case_begin(&mut self, _case: &TestCase) {}
    fn case_end(&mut self, _case: &TestCase, _result: &str) {}
    fn project_end(&mut self, _project: &TestProject, _stats: &RunStats) {}
}
