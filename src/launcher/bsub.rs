// src/launcher/bsub.rs

//! Sunway TaihuLight backend. `bsub -I` blocks until the remote job
//! completes, so the interactive exit-code mapping applies even though the
//! work goes through the vendor queue.

use clap::Args;

use crate::errors::Result;
use crate::launcher::process::run_blocking;
use crate::launcher::script::ScriptBuilder;
use crate::launcher::{case_env, has_program, Launcher, Outcome, RunContext};
use crate::project::TestCase;

/// Options for the `bsub` backend.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "bsub options")]
pub struct BsubOpts {
    /// Select job queue to use.
    #[arg(long = "bsub-queue", value_name = "QUEUE")]
    pub queue: Option<String>,

    /// Use large segment support.
    #[arg(long = "bsub-b")]
    pub large_seg: bool,

    /// Number of slave cores per core group.
    #[arg(long = "bsub-cgsp", value_name = "CGSP")]
    pub cgsp: Option<String>,

    /// Share region size.
    #[arg(long = "bsub-share_size", value_name = "SIZE")]
    pub share_size: Option<String>,

    /// Host stack size.
    #[arg(long = "bsub-host_stack", value_name = "SIZE")]
    pub host_stack: Option<String>,
}

pub struct BsubLauncher {
    opts: BsubOpts,
}

impl BsubLauncher {
    pub fn new(opts: BsubOpts) -> Self {
        Self { opts }
    }

    pub fn available() -> bool {
        has_program("bsub")
    }

    fn command(&self, case: &TestCase) -> Vec<String> {
        let run = &case.spec.run;
        let mut argv = vec![
            "bsub".to_string(),
            "-I".to_string(),
            "-n".to_string(),
            run.nprocs.to_string(),
        ];
        if let Some(ppn) = run.procs_per_node {
            argv.push("-np".to_string());
            argv.push(ppn.to_string());
        }
        if self.opts.large_seg {
            argv.push("-b".to_string());
        }
        // TODO: pass the case timeout through once the target bsub exposes a
        // wallclock flag.
        if let Some(queue) = &self.opts.queue {
            argv.push("-q".to_string());
            argv.push(queue.clone());
        }
        if let Some(cgsp) = &self.opts.cgsp {
            argv.push("-cgsp".to_string());
            argv.push(cgsp.clone());
        }
        if let Some(share_size) = &self.opts.share_size {
            argv.push("-share_size".to_string());
            argv.push(share_size.clone());
        }
        if let Some(host_stack) = &self.opts.host_stack {
            argv.push("-host_stack".to_string());
            argv.push(host_stack.clone());
        }
        argv.extend(case.spec.cmd_strings());
        argv
    }
}

impl Launcher for BsubLauncher {
    fn name(&self) -> &'static str {
        "bsub"
    }

    fn run(&self, case: &TestCase, ctx: &RunContext<'_>) -> Result<Option<Outcome>> {
        let argv = self.command(case);

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
