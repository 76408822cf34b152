// src/launcher/script.rs

//! Shell quoting and job-script generation.
//!
//! One builder serves every script-writing path (plain run.sh wrappers,
//! sbatch/yhbatch job specs, PBS job files): an ordered list of scheduler
//! directive lines, exported environment assignments, and command lines.
//! Commands are usually argv lists quoted token-wise; raw lines exist for
//! the few places that need shell redirection or `cd`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Quote a value for a generated shell script. Anything containing shell
/// metacharacters (`*?[]${}();>&`) or whitespace is wrapped in double
/// quotes; everything else passes through untouched.
pub fn shell_quote(value: &str) -> String {
    let special = |c: char| c.is_whitespace() || "*?[]${}();>&".contains(c);
    if value.is_empty() || value.chars().any(special) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Render an argv as a single script line with each token quoted.
pub fn join_quoted(argv: &[String]) -> String {
    argv.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builder for bash job scripts.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    directives: Vec<String>,
    envs: BTreeMap<String, String>,
    lines: Vec<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scheduler directive, rendered as `#<directive>` under the
    /// shebang (e.g. `SBATCH -n 64` or `PBS -q work`).
    pub fn directive(&mut self, directive: impl Into<String>) -> &mut Self {
        self.directives.push(directive.into());
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(&mut self, envs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in envs {
            self.envs.insert(k.into(), v.into());
        }
        self
    }

    /// Add a command as an argv list; every token is shell-quoted.
    pub fn command(&mut self, argv: &[String]) -> &mut Self {
        self.lines.push(join_quoted(argv));
        self
    }

    /// Add a verbatim script line (redirections, `cd`, cleanup one-liners).
    pub fn raw(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/bash\n#\n");
        for d in &self.directives {
            out.push('#');
            out.push_str(d);
            out.push('\n');
        }
        out.push('\n');
        if !self.envs.is_empty() {
            for (k, v) in &self.envs {
                out.push_str(&format!("export {k}={}\n", shell_quote(v)));
            }
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Write the script with mode 0755.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("writing job script to {:?}", path))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .with_context(|| format!("setting permissions on {:?}", path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn quoting_rule_matches_metacharacter_set() {
        assert_eq!(shell_quote("plain-value_1"), "plain-value_1");
        assert_eq!(shell_quote("/usr/bin/bench"), "/usr/bin/bench");
        assert_eq!(shell_quote("a b"), "\"a b\"");
        assert_eq!(shell_quote("$HOME"), "\"$HOME\"");
        assert_eq!(shell_quote("x;y"), "\"x;y\"");
        assert_eq!(shell_quote("glob*"), "\"glob*\"");
        assert_eq!(shell_quote("2>err"), "\"2>err\"");
        assert_eq!(shell_quote(""), "\"\"");
    }

    proptest! {
        #[test]
        fn quoting_is_wrap_or_identity(s in "\\PC{0,40}") {
            let quoted = shell_quote(&s);
            let wrapped = format!("\"{}\"", s);
            prop_assert!(quoted == s || quoted == wrapped);
        }

        #[test]
        fn values_without_metacharacters_pass_through(s in "[A-Za-z0-9_./=,:+-]{1,40}") {
            prop_assert_eq!(shell_quote(&s), s);
        }
    }

    #[test]
    fn render_orders_shebang_directives_envs_commands() {
        let mut script = ScriptBuilder::new();
        script
            .directive("SBATCH -n 4")
            .env("OMP_NUM_THREADS", "4")
            .env("SPACED", "a b")
            .command(&["./bench".to_string(), "--size".to_string(), "big one".to_string()])
            .raw("rm -f /tmp/hostfile-$$");
        let text = script.render();
        let expected = "#!/bin/bash\n\
                        #\n\
                        #SBATCH -n 4\n\
                        \n\
                        export OMP_NUM_THREADS=4\n\
                        export SPACED=\"a b\"\n\
                        \n\
                        ./bench --size \"big one\"\n\
                        rm -f /tmp/hostfile-$$\n";
        assert_eq!(text, expected);
    }
}
