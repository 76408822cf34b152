// src/launcher/yhrun.rs

//! Tianhe backend: interactive `yhrun` or batch `yhbatch` submission.
//!
//! The job command is kept as structured fields and rendered twice: the
//! interactive form carries the placement flags (`-p`/`-x`/`-w`), the batch
//! form omits them because they collide with `yhbatch`'s own flags. GLEX
//! network-stack workarounds are applied as environment variables keyed by
//! process count and the selected fix version.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use crate::errors::{BenchrunError, Result};
use crate::launcher::process::run_blocking;
use crate::launcher::script::ScriptBuilder;
use crate::launcher::{case_env, has_program, job_name, Launcher, Outcome, RunContext};
use crate::project::{RunSpec, TestCase};

/// GLEX workaround selector. `v0`/`v1` apply their variable set only above
/// 8192 processes; `v2` keys off per-node geometry instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GlexFix {
    #[default]
    None,
    V0,
    V1,
    V2,
}

/// Options for the `yhrun` backend.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "yhrun options")]
pub struct YhrunOpts {
    /// Select job partition to use.
    #[arg(long = "yhrun-partition", visible_alias = "yhrun-p", value_name = "PARTITION")]
    pub partition: Option<String>,

    /// Exclude nodes from job allocation.
    #[arg(long = "yhrun-x", value_name = "NODELIST")]
    pub excluded_nodes: Option<String>,

    /// Use only selected nodes.
    #[arg(long = "yhrun-w", value_name = "NODELIST")]
    pub only_nodes: Option<String>,

    /// Use yhbatch instead of yhrun.
    #[arg(long = "yhrun-yhbatch")]
    pub use_batch: bool,

    /// Fix GLEX settings.
    #[arg(
        long = "yhrun-fix-glex",
        value_enum,
        default_value_t = GlexFix::None,
        value_name = "VERSION"
    )]
    pub fix_glex: GlexFix,

    /// Use yhbcast to prepare a node-local directory.
    #[arg(long = "yhrun-yhbcast")]
    pub use_yhbcast: bool,
}

pub struct YhrunLauncher {
    opts: YhrunOpts,
}

impl YhrunLauncher {
    pub fn new(opts: YhrunOpts) -> Self {
        Self { opts }
    }

    pub fn available() -> bool {
        has_program("yhrun")
    }

    /// Render the `yhrun` prefix. The batch form leaves out `-p`/`-x`/`-w`;
    /// those travel on the `yhbatch` command line instead.
    fn yhrun_args(&self, run: &RunSpec, timeout: Option<u64>, with_placement: bool) -> Vec<String> {
        let mut argv = vec!["yhrun".to_string()];
        if let Some(nnodes) = run.nnodes {
            argv.push("-N".to_string());
            argv.push(nnodes.to_string());
        }
        argv.push("-n".to_string());
        argv.push(run.nprocs.to_string());
        if let Some(tasks) = run.tasks_per_proc {
            argv.push("-c".to_string());
            argv.push(tasks.to_string());
        }
        if let Some(minutes) = timeout {
            argv.push("-t".to_string());
            argv.push(minutes.to_string());
        }
        if with_placement {
            if let Some(partition) = &self.opts.partition {
                argv.push("-p".to_string());
                argv.push(partition.clone());
            }
            if let Some(excluded) = &self.opts.excluded_nodes {
                argv.push("-x".to_string());
                argv.push(excluded.clone());
            }
            if let Some(only) = &self.opts.only_nodes {
                argv.push("-w".to_string());
                argv.push(only.clone());
            }
        }
        argv.push("-o".to_string());
        argv.push("STDOUT".to_string());
        argv.push("-e".to_string());
        argv.push("STDERR".to_string());
        argv
    }

    fn run_batch(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let run = &case.spec.run;
        let Some(nnodes) = run.nnodes else {
            return Err(BenchrunError::CaseSpec {
                path: case.rel_path.clone(),
                reason: "yhbatch submission requires run.nnodes".to_string(),
            });
        };

        let exec_cmd = case.spec.cmd_strings();
        let mut job_cmd = self.yhrun_args(run, ctx.timeout, false);
        job_cmd.extend(exec_cmd.iter().cloned());

        let mut script = ScriptBuilder::new();
        script.envs(case.spec.env_strings());
        script.envs(glex_fix_envs(self.opts.fix_glex, run));
        let mirrors = case.spec.mirror_files.as_ref().filter(|_| self.opts.use_yhbcast);
        if let Some(mirrors) = mirrors {
            let cleanup: Vec<Vec<String>> = mirrors
                .values()
                .map(|dst| {
                    let mut rm = self.yhrun_args(run, ctx.timeout, false);
                    rm.extend(["rm".to_string(), "-f".to_string(), dst.clone()]);
                    rm
                })
                .collect();
            for cmd in &cleanup {
                script.command(cmd);
            }
            for (src, dst) in mirrors {
                script.command(&["yhbcast".to_string(), src.clone(), dst.clone()]);
            }
            script.command(&job_cmd);
            for cmd in &cleanup {
                script.command(cmd);
            }
        } else {
            script.command(&job_cmd);
        }
        script.write(&case.dir.join("batch_spec.sh"))?;

        let mut submit = vec!["yhbatch".to_string(), "-N".to_string(), nnodes.to_string()];
        if let Some(partition) = &self.opts.partition {
            submit.push("-p".to_string());
            submit.push(partition.clone());
        }
        if let Some(excluded) = &self.opts.excluded_nodes {
            submit.push("-x".to_string());
            submit.push(excluded.clone());
        }
        if let Some(only) = &self.opts.only_nodes {
            submit.push("-w".to_string());
            submit.push(only.clone());
        }
        submit.push("-J".to_string());
        submit.push(job_name(&exec_cmd));
        submit.push("./batch_spec.sh".to_string());

        if ctx.make_script {
            let mut wrapper = ScriptBuilder::new();
            wrapper.command(&submit);
            wrapper.write(&case.dir.join("run.sh"))?;
        }
        if ctx.dry_run {
            return Ok(None);
        }

        info!(case = %case.rel_path, "submitting via yhbatch");
        let (program, rest) = (&submit[0], &submit[1..]);
        std::process::Command::new(program)
            .args(rest)
            .current_dir(&case.dir)
            .env_clear()
            .envs(ctx.base_env)
            .status()
            .context("submitting job via yhbatch")?;
        // Queue hand-off only: acceptance is all we can observe here.
        Ok(Some(Outcome::Success))
    }

    fn run_interactive(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let run = &case.spec.run;
        let mut argv = self.yhrun_args(run, ctx.timeout, true);
        argv.extend(case.spec.cmd_strings());

        let fix_envs = glex_fix_envs(self.opts.fix_glex, run);

        if ctx.make_script {
            let mut script = ScriptBuilder::new();
            script
                .envs(case.spec.env_strings())
                .envs(fix_envs.clone())
                .command(&argv);
            script.write(&case.dir.join("run.sh"))?;
        }
        if ctx.dry_run {
            return Ok(None);
        }

        let mut env = case_env(ctx.base_env, &case.spec);
        env.extend(fix_envs);
        Ok(Some(run_blocking(&argv, &case.dir, &env, ctx.verbose)?))
    }
}

impl Launcher for YhrunLauncher {
    fn name(&self) -> &'static str {
        "yhrun"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        // yhbcast staging only works from inside a batch allocation.
        if self.opts.use_batch || self.opts.use_yhbcast {
            self.run_batch(case, ctx)
        } else {
            self.run_interactive(case, ctx)
        }
    }
}

/// Environment workarounds for the GLEX network stack. The 8192-process
/// threshold is strictly greater-than: at exactly 8192 nothing is set.
fn glex_fix_envs(fix: GlexFix, run: &RunSpec) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    let set = |envs: &mut BTreeMap<String, String>, pairs: &[(&str, &str)]| {
        for (k, v) in pairs {
            envs.insert((*k).to_string(), (*v).to_string());
        }
    };
    match fix {
        GlexFix::None => {}
        GlexFix::V0 => {
            if run.nprocs.get() > 8192 {
                set(&mut envs, &[
                    ("PDP_GLEX_USE_HC_MPQ", "1"),
                    ("PDP_GLEX_HC_MPQ_L1_CAPACITY", "16384"),
                    ("GLEX_BYPASS_RDMA_WRITE_CHANNEL", "1"),
                    ("GLEX_EP_MPQ_SLOTS", "131072"),
                    ("GLEX_USE_ZC_RNDV", "0"),
                ]);
            }
        }
        GlexFix::V1 => {
            if run.nprocs.get() > 8192 {
                set(&mut envs, &[
                    ("MPICH_NO_LOCAL", "1"),
                    ("GLEX_BYPASS_ER", "1"),
                    ("GLEX_USE_ZC_RNDV", "0"),
                ]);
            }
        }
        GlexFix::V2 => {
            let ppn = run.procs_per_node.map(|c| c.get()).unwrap_or(1);
            if ppn > 32 {
                envs.insert("MPICH_NEMESIS_NETMOD".to_string(), "tcp".to_string());
            }
            let nnodes = run.nnodes.map(|c| c.get()).unwrap_or(1);
            if nnodes > 1 {
                envs.insert("MPICH_CH3_NO_LOCAL".to_string(), "1".to_string());
            }
        }
    }
    envs
}
