// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Configuration problems (bad manifest, missing case spec, unusable
//! launcher) get their own variants so callers can surface them before any
//! case runs. Everything else flows through as `io`/`json`/`anyhow` chains.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchrunError {
    #[error("invalid test project at {root}: {reason}")]
    Project { root: PathBuf, reason: String },

    #[error("invalid case spec for '{path}': {reason}")]
    CaseSpec { path: String, reason: String },

    #[error("launcher '{0}' is not available on this host")]
    LauncherUnavailable(String),

    #[error(
        "failed to automatically determine a job launcher, \
         please specify one via --launcher"
    )]
    NoLauncher,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BenchrunError>;
