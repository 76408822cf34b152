// src/project/reader.rs

//! Project loading and lazy case iteration.
//!
//! `TestProject::open` reads the manifest once and verifies that every
//! declared case directory carries a `TestCase.json`, so all configuration
//! errors surface before any case runs. Case specs themselves are read
//! lazily, one per iteration step, so memory use stays proportional to a
//! single case regardless of project size.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{BenchrunError, Result};
use crate::project::model::{CaseId, CaseRef, CaseSpec, ProjectManifest, RunStats, TestVector};

const MANIFEST_FILE: &str = "TestProject.json";
const CASE_SPEC_FILE: &str = "TestCase.json";
const RUN_STATS_FILE: &str = "run_stats.json";

/// A loaded test project: manifest data plus the previous run's stats, if
/// any. Immutable after `open`.
#[derive(Debug)]
pub struct TestProject {
    root: PathBuf,
    pub name: String,
    pub test_factors: Vec<String>,
    pub data_files: Vec<String>,
    cases: Vec<CaseRef>,
    pub last_stats: Option<RunStats>,
}

/// One case, ready to launch: identity, absolute working directory and the
/// parsed spec.
#[derive(Debug)]
pub struct TestCase {
    pub test_vector: TestVector,
    /// Case path relative to the project root, as declared in the manifest.
    pub rel_path: String,
    /// Absolute case working directory.
    pub dir: PathBuf,
    pub spec: CaseSpec,
}

impl TestCase {
    pub fn id(&self) -> CaseId {
        CaseId {
            test_vector: self.test_vector.clone(),
            path: self.rel_path.clone(),
        }
    }
}

impl TestProject {
    /// Open a project rooted at `root`.
    ///
    /// Fails with a configuration error when the manifest is absent or
    /// malformed, its version is missing or unsupported, or any declared
    /// case lacks its spec file.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|err| BenchrunError::Project {
            root: root.to_path_buf(),
            reason: format!("cannot resolve project root: {err}"),
        })?;

        let manifest_path = root.join(MANIFEST_FILE);
        let text = fs::read_to_string(&manifest_path).map_err(|err| BenchrunError::Project {
            root: root.clone(),
            reason: format!("reading {MANIFEST_FILE}: {err}"),
        })?;
        let manifest: ProjectManifest =
            serde_json::from_str(&text).map_err(|err| BenchrunError::Project {
                root: root.clone(),
                reason: format!("parsing {MANIFEST_FILE}: {err}"),
            })?;

        match manifest.version {
            Some(1) => {}
            Some(v) => {
                return Err(BenchrunError::Project {
                    root,
                    reason: format!("unsupported project version '{v}', only 1 is supported"),
                });
            }
            None => {
                return Err(BenchrunError::Project {
                    root,
                    reason: "manifest is missing the 'version' field".to_string(),
                });
            }
        }

        let factors: std::collections::BTreeSet<&str> =
            manifest.test_factors.iter().map(String::as_str).collect();
        for case in &manifest.test_cases {
            let vector_keys: std::collections::BTreeSet<&str> =
                case.test_vector.keys().map(String::as_str).collect();
            if vector_keys != factors {
                return Err(BenchrunError::Project {
                    root,
                    reason: format!(
                        "test vector for '{}' does not match the declared test factors",
                        case.path
                    ),
                });
            }
            if Path::new(&case.path).is_absolute() {
                return Err(BenchrunError::Project {
                    root,
                    reason: format!("case path '{}' must be project-relative", case.path),
                });
            }
            let spec_path = root.join(&case.path).join(CASE_SPEC_FILE);
            if !spec_path.is_file() {
                return Err(BenchrunError::Project {
                    root,
                    reason: format!(
                        "test case '{}' is missing its {CASE_SPEC_FILE}",
                        case.path
                    ),
                });
            }
        }

        let stats_path = root.join(RUN_STATS_FILE);
        let last_stats = if stats_path.is_file() {
            Some(RunStats::load(&stats_path)?)
        } else {
            None
        };

        debug!(
            project = %manifest.name,
            cases = manifest.test_cases.len(),
            has_history = last_stats.is_some(),
            "opened test project"
        );

        Ok(Self {
            root,
            name: manifest.name,
            test_factors: manifest.test_factors,
            data_files: manifest.data_files,
            cases: manifest.test_cases,
            last_stats,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of declared cases, without touching any case spec.
    pub fn count_cases(&self) -> usize {
        self.cases.len()
    }

    /// Lazy, restartable iteration over the cases in manifest order. Each
    /// step reads and parses one `TestCase.json`.
    pub fn cases(&self) -> impl Iterator<Item = Result<TestCase>> + '_ {
        self.cases.iter().map(|case| self.load_case(case))
    }

    fn load_case(&self, case: &CaseRef) -> Result<TestCase> {
        let dir = self.root.join(&case.path);
        let spec_path = dir.join(CASE_SPEC_FILE);
        let text = fs::read_to_string(&spec_path).map_err(|err| BenchrunError::CaseSpec {
            path: case.path.clone(),
            reason: format!("reading {CASE_SPEC_FILE}: {err}"),
        })?;
        let spec: CaseSpec =
            serde_json::from_str(&text).map_err(|err| BenchrunError::CaseSpec {
                path: case.path.clone(),
                reason: err.to_string(),
            })?;
        if spec.cmd.is_empty() {
            return Err(BenchrunError::CaseSpec {
                path: case.path.clone(),
                reason: "cmd must not be empty".to_string(),
            });
        }
        Ok(TestCase {
            test_vector: case.test_vector.clone(),
            rel_path: case.path.clone(),
            dir,
            spec,
        })
    }
}
