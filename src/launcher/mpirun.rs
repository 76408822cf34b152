// src/launcher/mpirun.rs

//! Plain-MPI backend: run the case under `mpirun` on the local allocation.
//!
//! With a timeout the whole command line is wrapped in `timeout <N>m`, so
//! the 124 exit-code convention applies.

use clap::Args;

use crate::errors::Result;
use crate::launcher::process::run_blocking;
use crate::launcher::script::ScriptBuilder;
use crate::launcher::{case_env, has_program, Launcher, Outcome, RunContext};
use crate::project::TestCase;

/// Options for the `mpirun` backend.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "mpirun options")]
pub struct MpirunOpts {
    /// Comma separated host list.
    #[arg(long = "mpirun-hosts", value_name = "HOSTS")]
    pub hosts: Option<String>,

    /// Processes per node.
    #[arg(long = "mpirun-ppn", value_name = "PPN")]
    pub ppn: Option<String>,
}

pub struct MpirunLauncher {
    opts: MpirunOpts,
}

impl MpirunLauncher {
    pub fn new(opts: MpirunOpts) -> Self {
        Self { opts }
    }

    pub fn available() -> bool {
        has_program("mpirun") || has_program("mpiexec")
    }

    fn command(&self, case: &TestCase, timeout: Option<u64>) -> Vec<String> {
        let mut argv = vec![
            "mpirun".to_string(),
            "-np".to_string(),
            case.spec.run.nprocs.to_string(),
        ];
        if let Some(hosts) = &self.opts.hosts {
            argv.push("-hosts".to_string());
            argv.push(hosts.clone());
        }
        if let Some(ppn) = &self.opts.ppn {
            argv.push("-ppn".to_string());
            argv.push(ppn.clone());
        }
        argv.extend(case.spec.cmd_strings());
        if let Some(minutes) = timeout {
            let mut wrapped = vec!["timeout".to_string(), format!("{minutes}m")];
            wrapped.extend(argv);
            argv = wrapped;
        }
        argv
    }
}

impl Launcher for MpirunLauncher {
    fn name(&self) -> &'static str {
        "mpirun"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let argv = self.command(case, ctx.timeout);

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
