// src/launcher/slurm.rs

//! Generic Slurm backend: interactive `srun` or batch `sbatch` submission.
//!
//! The batch path writes a `job_spec.sh` whose `#SBATCH` directives mirror
//! the interactive geometry, then discovers the allocated hosts with
//! `srun hostname` and launches the real job through the selected MPI
//! vendor's `mpirun` flavour over that hostfile.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use crate::errors::Result;
use crate::launcher::process::run_blocking;
use crate::launcher::script::{join_quoted, ScriptBuilder};
use crate::launcher::{case_env, has_program, job_name, Launcher, Outcome, RunContext};
use crate::project::{RunSpec, TestCase};

/// Temp hostfile used inside batch jobs; `$$` expands to the job shell's
/// pid so concurrent jobs don't collide.
const HOSTFILE: &str = "/tmp/hostfile-$$";

/// MPI flavour used inside sbatch jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MpiVendor {
    Mpich,
    #[default]
    Openmpi,
    Mvapich2,
    Intelmpi,
}

impl MpiVendor {
    /// Build the vendor's `mpirun`-style argv over a hostfile, plus the
    /// timeout environment it understands (`MPIEXEC_TIMEOUT`, seconds).
    fn job_command(
        self,
        nprocs: u64,
        procs_per_node: u64,
        hostfile: &str,
        timeout_minutes: Option<u64>,
    ) -> (Vec<String>, BTreeMap<String, String>) {
        let cmd = match self {
            MpiVendor::Openmpi => vec![
                "mpirun".to_string(),
                "-n".to_string(),
                nprocs.to_string(),
                "--map-by".to_string(),
                "slot".to_string(),
                "-hostfile".to_string(),
                hostfile.to_string(),
            ],
            MpiVendor::Mpich | MpiVendor::Mvapich2 | MpiVendor::Intelmpi => vec![
                "mpirun".to_string(),
                "-n".to_string(),
                nprocs.to_string(),
                "-ppn".to_string(),
                procs_per_node.to_string(),
                "-hosts".to_string(),
                hostfile.to_string(),
            ],
        };
        let mut envs = BTreeMap::new();
        if let Some(minutes) = timeout_minutes {
            envs.insert("MPIEXEC_TIMEOUT".to_string(), (minutes * 60).to_string());
        }
        (cmd, envs)
    }
}

/// Options for the `slurm` backend.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "slurm options")]
pub struct SlurmOpts {
    /// Select job partition to use.
    #[arg(long = "slurm-partition", value_name = "PARTITION")]
    pub partition: Option<String>,

    /// Use sbatch instead of srun.
    #[arg(long = "slurm-sbatch")]
    pub use_batch: bool,

    /// Select the MPI flavour used inside batch jobs.
    #[arg(
        long = "slurm-mpi",
        value_enum,
        default_value_t = MpiVendor::Openmpi,
        value_name = "MPI"
    )]
    pub mpi: MpiVendor,
}

pub struct SlurmLauncher {
    opts: SlurmOpts,
}

impl SlurmLauncher {
    pub fn new(opts: SlurmOpts) -> Self {
        Self { opts }
    }

    pub fn available() -> bool {
        has_program("sbatch")
    }

    fn srun_args(&self, run: &RunSpec, timeout: Option<u64>) -> Vec<String> {
        let mut argv = vec!["srun".to_string()];
        if let Some(nnodes) = run.nnodes {
            argv.push("-N".to_string());
            argv.push(nnodes.to_string());
        }
        argv.push("-n".to_string());
        argv.push(run.nprocs.to_string());
        if let Some(ppn) = run.procs_per_node {
            argv.push("--ntasks-per-node".to_string());
            argv.push(ppn.to_string());
        }
        if let Some(tasks) = run.tasks_per_proc {
            argv.push("-c".to_string());
            argv.push(tasks.to_string());
        }
        if let Some(minutes) = timeout {
            argv.push("-t".to_string());
            argv.push(minutes.to_string());
        }
        if let Some(partition) = &self.opts.partition {
            argv.push("-p".to_string());
            argv.push(partition.clone());
        }
        argv
    }

    fn run_batch(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let run = &case.spec.run;
        let exec_cmd = case.spec.cmd_strings();

        let mut script = ScriptBuilder::new();
        script.directive(format!("SBATCH -J {}", job_name(&exec_cmd)));
        if let Some(nnodes) = run.nnodes {
            script.directive(format!("SBATCH -N {nnodes}"));
        }
        script.directive(format!("SBATCH -n {}", run.nprocs));
        if let Some(ppn) = run.procs_per_node {
            script.directive(format!("SBATCH --ntasks-per-node {ppn}"));
        }
        if let Some(tasks) = run.tasks_per_proc {
            script.directive(format!("SBATCH -c {tasks}"));
        }
        if let Some(minutes) = ctx.timeout {
            script.directive(format!("SBATCH -t {minutes}"));
        }
        if let Some(partition) = &self.opts.partition {
            script.directive(format!("SBATCH -p {partition}"));
        }
        script.directive("SBATCH -o STDOUT");
        script.directive("SBATCH -e STDERR");

        let ppn = run.procs_per_node.map(|c| c.get()).unwrap_or(1);
        let (mpi_cmd, mpi_envs) =
            self.opts
                .mpi
                .job_command(run.nprocs.get(), ppn, HOSTFILE, ctx.timeout);

        script.envs(case.spec.env_strings());
        script.envs(mpi_envs);

        let mut hostname_cmd = self.srun_args(run, ctx.timeout);
        hostname_cmd.push("hostname".to_string());
        script.raw(format!("{} > {HOSTFILE}", join_quoted(&hostname_cmd)));
        let mut job_cmd = mpi_cmd;
        job_cmd.extend(exec_cmd);
        script.command(&job_cmd);
        script.raw(format!("rm -f {HOSTFILE}"));
        script.write(&case.dir.join("job_spec.sh"))?;

        let submit = vec!["sbatch".to_string(), "job_spec.sh".to_string()];
        if ctx.make_script {
            let mut wrapper = ScriptBuilder::new();
            wrapper.command(&submit);
            wrapper.write(&case.dir.join("run.sh"))?;
        }
        if ctx.dry_run {
            return Ok(None);
        }

        info!(case = %case.rel_path, "submitting via sbatch");
        std::process::Command::new(&submit[0])
            .args(&submit[1..])
            .current_dir(&case.dir)
            .env_clear()
            .envs(ctx.base_env)
            .status()
            .context("submitting job via sbatch")?;
        // Queue hand-off only: acceptance is all we can observe here.
        Ok(Some(Outcome::Success))
    }

    fn run_interactive(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let mut argv = self.srun_args(&case.spec.run, ctx.timeout);
        argv.extend(case.spec.cmd_strings());

        if ctx.make_script {
            let mut script = ScriptBuilder::new();
            script.envs(case.spec.env_strings()).command(&argv);
            script.write(&case.dir.join("run.sh"))?;
        }
        if ctx.dry_run {
            return Ok(None);
        }

        let env = case_env(ctx.base_env, &case.spec);
        Ok(Some(run_blocking(&argv, &case.dir, &env, ctx.verbose)?))
    }
}

impl Launcher for SlurmLauncher {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        if self.opts.use_batch {
            self.run_batch(case, ctx)
        } else {
            self.run_interactive(case, ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_dispatch_table_shapes() {
        let (mpich, _) = MpiVendor::Mpich.job_command(64, 16, "/tmp/hf", None);
        assert_eq!(mpich, ["mpirun", "-n", "64", "-ppn", "16", "-hosts", "/tmp/hf"]);

        let (openmpi, _) = MpiVendor::Openmpi.job_command(64, 16, "/tmp/hf", None);
        assert_eq!(
            openmpi,
            ["mpirun", "-n", "64", "--map-by", "slot", "-hostfile", "/tmp/hf"]
        );

        let (mvapich2, _) = MpiVendor::Mvapich2.job_command(8, 4, "/tmp/hf", None);
        assert_eq!(mvapich2, ["mpirun", "-n", "8", "-ppn", "4", "-hosts", "/tmp/hf"]);

        let (intelmpi, _) = MpiVendor::Intelmpi.job_command(8, 4, "/tmp/hf", None);
        assert_eq!(intelmpi, ["mpirun", "-n", "8", "-ppn", "4", "-hosts", "/tmp/hf"]);
    }

    #[test]
    fn timeout_becomes_seconds_in_mpiexec_env() {
        let (_, envs) = MpiVendor::Openmpi.job_command(4, 1, "/tmp/hf", Some(5));
        assert_eq!(envs["MPIEXEC_TIMEOUT"], "300");
        let (_, envs) = MpiVendor::Mpich.job_command(4, 1, "/tmp/hf", None);
        assert!(envs.is_empty());
    }

    #[test]
    fn srun_args_carry_full_geometry() {
        let launcher = SlurmLauncher::new(SlurmOpts {
            partition: Some("debug".to_string()),
            ..Default::default()
        });
        let run: RunSpec = serde_json::from_value(serde_json::json!({
            "nprocs": 64, "nnodes": 4, "procs_per_node": 16, "tasks_per_proc": 2
        }))
        .unwrap();
        assert_eq!(
            launcher.srun_args(&run, Some(15)),
            [
                "srun", "-N", "4", "-n", "64", "--ntasks-per-node", "16", "-c", "2",
                "-t", "15", "-p", "debug"
            ]
        );
    }
}
