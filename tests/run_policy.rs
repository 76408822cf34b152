// tests/run_policy.rs

//! End-to-end policy behaviour of the run loop: filtering, history-based
//! skipping, validation-based skipping, dry runs and stats persistence.

mod common;

use std::error::Error;
use std::fs;

use serde_json::json;

use benchrun::engine::{run_project, CaseFilter, RunOptions};
use benchrun::launcher::Outcome;
use benchrun::project::{RunStats, TestProject};
use common::{base_env, open, simple_spec, write_case, write_manifest, write_project,
             FakeLauncher, NullReporter};

type TestResult = Result<(), Box<dyn Error>>;

fn filter(exclude: &[&str], include: &[&str]) -> CaseFilter {
    let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
    let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
    CaseFilter::new(&exclude, &include).unwrap()
}

fn run(
    project: &TestProject,
    launcher: &FakeLauncher,
    filter: &CaseFilter,
    opts: &RunOptions,
) -> RunStats {
    run_project(
        project,
        launcher,
        &mut NullReporter,
        filter,
        opts,
        &base_env(),
    )
    .expect("pass should complete")
}

#[test]
fn exclude_always_beats_include() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_project(dir.path(), &["bench/a", "bench/b"]);
    let project = open(dir.path());
    let launcher = FakeLauncher::all_success();

    // bench/a matches both filters; exclude wins.
    let f = filter(&["bench/a"], &["bench/*"]);
    let stats = run(&project, &launcher, &f, &RunOptions::default());

    assert_eq!(launcher.calls(), ["bench/b"]);
    assert_eq!(stats.skipped.len(), 1);
    assert_eq!(stats.skipped[0].path, "bench/a");
    assert_eq!(stats.success.len(), 1);
    Ok(())
}

#[test]
fn cases_outside_include_patterns_are_skipped() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_project(dir.path(), &["bench/a", "other/x"]);
    let project = open(dir.path());
    let launcher = FakeLauncher::all_success();

    let f = filter(&[], &["bench/*"]);
    let stats = run(&project, &launcher, &f, &RunOptions::default());

    assert_eq!(launcher.calls(), ["bench/a"]);
    assert_eq!(stats.skipped.len(), 1);
    assert_eq!(stats.skipped[0].path, "other/x");
    Ok(())
}

#[test]
fn skip_finished_round_trip_is_idempotent() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_project(dir.path(), &["bench/a", "bench/b"]);
    let f = filter(&[], &[]);

    // First pass: everything runs and succeeds.
    let launcher = FakeLauncher::all_success();
    let first = run(&open(dir.path()), &launcher, &f, &RunOptions::default());
    assert_eq!(launcher.calls().len(), 2);
    assert_eq!(first.success.len(), 2);

    // Second pass with --skip-finished: nothing runs, stats unchanged.
    let opts = RunOptions {
        skip_finished: true,
        ..Default::default()
    };
    let launcher = FakeLauncher::all_success();
    let second = run(&open(dir.path()), &launcher, &f, &opts);
    assert!(launcher.calls().is_empty());
    assert_eq!(second, first);

    // Third pass: still identical skip decisions.
    let launcher = FakeLauncher::all_success();
    let third = run(&open(dir.path()), &launcher, &f, &opts);
    assert!(launcher.calls().is_empty());
    assert_eq!(third, first);
    Ok(())
}

#[test]
fn scenario_exclude_history_and_fresh_case() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_project(dir.path(), &["bench/a", "bench/b", "bench/c"]);
    // bench/b already succeeded in a previous pass.
    fs::write(
        dir.path().join("run_stats.json"),
        json!({
            "success": [{"test_vector": {"case": "bench/b"}, "path": "bench/b"}],
            "timeout": [], "failed": [], "skipped": []
        })
        .to_string(),
    )?;

    let project = open(dir.path());
    let launcher = FakeLauncher::all_success().with_outcome("bench/c", Outcome::Failed);
    let f = filter(&["bench/a"], &[]);
    let opts = RunOptions {
        skip_finished: true,
        ..Default::default()
    };
    let stats = run(&project, &launcher, &f, &opts);

    // Only the fresh case ran; its exit status chose the bucket.
    assert_eq!(launcher.calls(), ["bench/c"]);
    assert_eq!(stats.skipped.len(), 1);
    assert_eq!(stats.skipped[0].path, "bench/a");
    assert_eq!(stats.success.len(), 1);
    assert_eq!(stats.success[0].path, "bench/b");
    assert_eq!(stats.failed.len(), 1);
    assert_eq!(stats.failed[0].path, "bench/c");

    // The persisted history reflects the same buckets.
    let persisted = RunStats::load(&dir.path().join("run_stats.json"))?;
    assert_eq!(persisted, stats);
    Ok(())
}

#[test]
fn dryrun_executes_nothing_and_persists_nothing() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_project(dir.path(), &["bench/a"]);
    let project = open(dir.path());
    let launcher = FakeLauncher::all_success();
    let opts = RunOptions {
        dry_run: true,
        ..Default::default()
    };
    let stats = run(&project, &launcher, &filter(&[], &[]), &opts);

    // The launcher is still consulted (it may generate artifacts) but no
    // outcome is bucketed and no history is written.
    assert_eq!(launcher.calls(), ["bench/a"]);
    assert_eq!(stats, RunStats::default());
    assert!(!dir.path().join("run_stats.json").exists());
    Ok(())
}

#[test]
fn rerun_failed_skips_cases_whose_output_validates() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), &["bench/done", "bench/broken"]);
    let validated = json!({
        "cmd": ["echo", "ok"],
        "envs": {},
        "run": {"nprocs": 1},
        "validator": {"contains": {"STDOUT": "PASS"}}
    });
    write_case(dir.path(), "bench/done", &validated);
    write_case(dir.path(), "bench/broken", &validated);
    // Only bench/done has passing output on disk.
    fs::write(dir.path().join("bench/done/STDOUT"), "all PASS here\n")?;
    fs::write(dir.path().join("bench/broken/STDOUT"), "nothing to see\n")?;

    let project = open(dir.path());
    let launcher = FakeLauncher::all_success();
    let opts = RunOptions {
        rerun_failed: true,
        ..Default::default()
    };
    let stats = run(&project, &launcher, &filter(&[], &[]), &opts);

    assert_eq!(launcher.calls(), ["bench/broken"]);
    // The already-done case is not re-bucketed anywhere.
    assert_eq!(stats.success.len(), 1);
    assert_eq!(stats.success[0].path, "bench/broken");
    assert!(stats.skipped.is_empty());
    Ok(())
}

#[test]
fn a_case_without_nprocs_aborts_the_pass() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), &["bench/a", "bench/bad"]);
    write_case(dir.path(), "bench/a", &simple_spec(1));
    write_case(
        dir.path(),
        "bench/bad",
        &json!({"cmd": ["echo"], "envs": {}, "run": {}}),
    );

    let project = open(dir.path());
    let launcher = FakeLauncher::all_success();
    let err = run_project(
        &project,
        &launcher,
        &mut NullReporter,
        &filter(&[], &[]),
        &RunOptions::default(),
        &base_env(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("bench/bad"));
    Ok(())
}
