// src/launcher/pbs.rs

//! PBS backend. Submission is always through `qsub`; there is no
//! interactive path, so an accepted submission is the only success signal.

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::errors::{BenchrunError, Result};
use crate::launcher::script::ScriptBuilder;
use crate::launcher::{case_env, has_program, job_name, Launcher, Outcome, RunContext};
use crate::project::TestCase;

/// Options for the `pbs` backend.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "pbs options")]
pub struct PbsOpts {
    /// Select job queue to use.
    #[arg(long = "pbs-queue", value_name = "QUEUE")]
    pub queue: Option<String>,

    /// Network interface to use.
    #[arg(long = "pbs-iface", value_name = "IFACE")]
    pub iface: Option<String>,
}

pub struct PbsLauncher {
    opts: PbsOpts,
}

impl PbsLauncher {
    pub fn new(opts: PbsOpts) -> Self {
        Self { opts }
    }

    pub fn available() -> bool {
        has_program("qstat")
    }

    fn write_job_file(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<()> {
        let run = &case.spec.run;
        let (Some(nnodes), Some(ppn)) = (run.nnodes, run.procs_per_node) else {
            return Err(BenchrunError::CaseSpec {
                path: case.rel_path.clone(),
                reason: "pbs submission requires run.nnodes and run.procs_per_node".to_string(),
            });
        };
        let exec_cmd = case.spec.cmd_strings();

        let mut script = ScriptBuilder::new();
        script.directive(format!("PBS -N {}", job_name(&exec_cmd)));
        script.directive(format!("PBS -l nodes={nnodes}:ppn={ppn}"));
        script.directive("PBS -j oe");
        script.directive("PBS -n");
        script.directive("PBS -V");
        script.directive("PBS -o STDOUT");
        if let Some(queue) = &self.opts.queue {
            script.directive(format!("PBS -q {queue}"));
        }
        if let Some(minutes) = ctx.timeout {
            script.directive(format!("PBS -l walltime={}", walltime(minutes)));
        }

        script.envs(case.spec.env_strings());
        script.raw("cd $PBS_O_WORKDIR");

        let mut job_cmd = vec![
            "mpirun".to_string(),
            "-np".to_string(),
            run.nprocs.to_string(),
            "-ppn".to_string(),
            ppn.to_string(),
            "-machinefile".to_string(),
            "$PBS_NODEFILE".to_string(),
        ];
        if let Some(iface) = &self.opts.iface {
            job_cmd.push("-iface".to_string());
            job_cmd.push(iface.clone());
        }
        job_cmd.extend(exec_cmd);
        script.command(&job_cmd);

        script.write(&case.dir.join("job_spec.pbs"))?;
        Ok(())
    }
}

impl Launcher for PbsLauncher {
    fn name(&self) -> &'static str {
        "pbs"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        self.write_job_file(case, ctx)?;

        let submit = vec!["qsub".to_string(), "./job_spec.pbs".to_string()];
        if ctx.make_script {
            let mut wrapper = ScriptBuilder::new();
            wrapper.command(&submit);
            wrapper.write(&case.dir.join("run.sh"))?;
        }
        if ctx.dry_run {
            return Ok(None);
        }

        info!(case = %case.rel_path, "submitting via qsub");
        let env = case_env(ctx.base_env, &case.spec);
        let status = std::process::Command::new(&submit[0])
            .args(&submit[1..])
            .current_dir(&case.dir)
            .env_clear()
            .envs(&env)
            .status()
            .context("submitting job via qsub")?;

        // Batch-only backend: an accepted submission is success, anything
        // else means the queue rejected it.
        if status.success() {
            Ok(Some(Outcome::Success))
        } else {
            Ok(Some(Outcome::Failed))
        }
    }
}

/// Render a minute count as the `HH:MM:00` walltime PBS expects.
fn walltime(minutes: u64) -> String {
    format!("{:02}:{:02}:00", minutes / 60, minutes % 60)
}
