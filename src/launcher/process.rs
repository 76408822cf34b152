// src/launcher/process.rs

//! Blocking execution of an interactive job command.
//!
//! The child runs in the case directory with a fully explicit environment
//! (base snapshot + case overrides). Its stdout and stderr land in the
//! fixed `STDOUT`/`STDERR` files; under `--verbose` each stream is
//! additionally teed to the controlling terminal. The call blocks until the
//! child exits; wall-clock limits are enforced externally by the command
//! itself (timeout wrapper or scheduler flag), never by an internal timer.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::launcher::Outcome;

pub const STDOUT_FILE: &str = "STDOUT";
pub const STDERR_FILE: &str = "STDERR";

/// Run `argv` to completion in `dir` and map its exit status to an outcome.
pub fn run_blocking(
    argv: &[String],
    dir: &Path,
    env: &BTreeMap<String, String>,
    verbose: bool,
) -> Result<Outcome> {
    let (program, rest) = argv.split_first().context("empty job command")?;
    info!(cmd = %argv.join(" "), dir = %dir.display(), "launching job command");

    let out_path = dir.join(STDOUT_FILE);
    let err_path = dir.join(STDERR_FILE);
    let out_file =
        File::create(&out_path).with_context(|| format!("creating {:?}", out_path))?;
    let err_file =
        File::create(&err_path).with_context(|| format!("creating {:?}", err_path))?;

    let mut cmd = Command::new(program);
    cmd.args(rest).current_dir(dir).env_clear().envs(env);

    let status = if verbose {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning job command '{program}'"))?;
        let stdout = child.stdout.take().context("child stdout not captured")?;
        let stderr = child.stderr.take().context("child stderr not captured")?;
        std::thread::scope(|scope| {
            scope.spawn(move || tee(stdout, out_file, std::io::stdout()));
            scope.spawn(move || tee(stderr, err_file, std::io::stderr()));
        });
        child
            .wait()
            .with_context(|| format!("waiting for job command '{program}'"))?
    } else {
        cmd.stdout(Stdio::from(out_file)).stderr(Stdio::from(err_file));
        cmd.status()
            .with_context(|| format!("running job command '{program}'"))?
    };

    let outcome = Outcome::from_status(status);
    info!(exit_code = status.code(), outcome = %outcome, "job command exited");
    Ok(outcome)
}

/// Copy `src` to both the capture file and the terminal until EOF. Terminal
/// write failures are ignored; the capture file is authoritative.
fn tee<R: Read, W: Write>(mut src: R, mut file: File, mut term: W) {
    let mut buf = [0u8; 8192];
    loop {
        match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(err) = file.write_all(&buf[..n]) {
                    debug!(error = %err, "output capture write failed");
                    break;
                }
                let _ = term.write_all(&buf[..n]);
            }
            Err(err) => {
                debug!(error = %err, "output capture read failed");
                break;
            }
        }
    }
    let _ = term.flush();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn base_env() -> BTreeMap<String, String> {
        std::env::vars().collect()
    }

    #[test]
    fn exit_status_maps_to_outcome() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(
            run_blocking(&sh("exit 0"), dir.path(), &base_env(), false)?,
            Outcome::Success
        );
        assert_eq!(
            run_blocking(&sh("exit 124"), dir.path(), &base_env(), false)?,
            Outcome::Timeout
        );
        assert_eq!(
            run_blocking(&sh("exit 3"), dir.path(), &base_env(), false)?,
            Outcome::Failed
        );
        Ok(())
    }

    #[test]
    fn output_is_redirected_into_case_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        run_blocking(
            &sh("echo out-line; echo err-line >&2"),
            dir.path(),
            &base_env(),
            false,
        )?;
        assert_eq!(fs::read_to_string(dir.path().join(STDOUT_FILE))?, "out-line\n");
        assert_eq!(fs::read_to_string(dir.path().join(STDERR_FILE))?, "err-line\n");
        Ok(())
    }

    #[test]
    fn verbose_mode_still_captures_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        run_blocking(&sh("echo teed"), dir.path(), &base_env(), true)?;
        assert_eq!(fs::read_to_string(dir.path().join(STDOUT_FILE))?, "teed\n");
        Ok(())
    }

    #[test]
    fn declared_envs_reach_the_child() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut env = base_env();
        env.insert("BENCH_MARKER".to_string(), "42".to_string());
        run_blocking(&sh("printf '%s' \"$BENCH_MARKER\""), dir.path(), &env, false)?;
        assert_eq!(fs::read_to_string(dir.path().join(STDOUT_FILE))?, "42");
        Ok(())
    }
}
