// src/project/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Factor-name → value assignment identifying a case within a project.
///
/// A `BTreeMap` keeps comparison independent of factor order.
pub type TestVector = BTreeMap<String, Value>;

/// Identity of a case as persisted in `run_stats.json`: the test vector plus
/// the project-relative case path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseId {
    pub test_vector: TestVector,
    pub path: String,
}

/// Top-level project manifest, read from `TestProject.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    /// Manifest format version. Must be present and equal to 1.
    pub version: Option<u64>,
    pub name: String,
    pub test_factors: Vec<String>,
    /// Data files copied into every case by the generator; informational here.
    #[serde(default)]
    pub data_files: Vec<String>,
    pub test_cases: Vec<CaseRef>,
}

/// One `test_cases` entry of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseRef {
    pub test_vector: TestVector,
    pub path: String,
}

/// Per-case specification, read from `TestCase.json` in the case directory.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseSpec {
    /// Command argv. Elements may be JSON numbers or bools; they are
    /// stringified before execution.
    pub cmd: Vec<Value>,
    #[serde(default)]
    pub envs: BTreeMap<String, Value>,
    pub run: RunSpec,
    /// Declared output artifact names; informational.
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub validator: Option<ValidatorSpec>,
    /// Source → destination mappings for node-local staging. Only the
    /// yhbatch+yhbcast path consumes these.
    #[serde(default)]
    pub mirror_files: Option<BTreeMap<String, String>>,
}

impl CaseSpec {
    /// The command argv with every element stringified.
    pub fn cmd_strings(&self) -> Vec<String> {
        self.cmd.iter().map(stringify).collect()
    }

    /// The declared environment with every value stringified.
    pub fn env_strings(&self) -> BTreeMap<String, String> {
        self.envs
            .iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect()
    }
}

/// Process/node geometry of a case. `nprocs` is mandatory; there is no
/// default process count.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSpec {
    pub nprocs: Count,
    #[serde(default)]
    pub nnodes: Option<Count>,
    #[serde(default)]
    pub procs_per_node: Option<Count>,
    #[serde(default)]
    pub tasks_per_proc: Option<Count>,
}

/// Success predicate declared by a case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorSpec {
    /// Paths (relative to the case dir) that must exist.
    #[serde(default)]
    pub exists: Vec<String>,
    /// Path → regex pairs; the file's text must contain a match.
    #[serde(default)]
    pub contains: BTreeMap<String, String>,
}

/// A positive process/node count. Accepts a JSON integer or a numeric
/// string; anything else (including zero) is a deserialization error, so a
/// malformed `run` section fails at load time instead of at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count(u64);

impl Count {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Count {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let parsed = match &value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n > 0 => Ok(Count(n)),
            _ => Err(D::Error::custom(format!(
                "expected a positive integer, got {value}"
            ))),
        }
    }
}

/// Stringify a JSON value the way it should appear on a command line or in
/// an environment assignment: strings verbatim, everything else rendered.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Per-outcome case buckets, persisted as the project's run history
/// (`run_stats.json`) and read back to support `--skip-finished`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(default)]
    pub success: Vec<CaseId>,
    #[serde(default)]
    pub timeout: Vec<CaseId>,
    #[serde(default)]
    pub failed: Vec<CaseId>,
    #[serde(default)]
    pub skipped: Vec<CaseId>,
}

impl RunStats {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading run stats from {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing run stats from {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing run stats")?;
        fs::write(path, text).with_context(|| format!("writing run stats to {:?}", path))
    }
}
