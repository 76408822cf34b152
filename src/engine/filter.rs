// src/engine/filter.rs

//! Include/exclude case filtering with shell-wildcard semantics.
//!
//! Patterns come straight from the CLI and are compiled once into
//! `globset::GlobSet`s. `*` is allowed to cross `/` so the patterns behave
//! like classic fnmatch globs over the whole project-relative path.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled case-path filter.
pub struct CaseFilter {
    exclude: Option<GlobSet>,
    include: Option<GlobSet>,
}

impl CaseFilter {
    pub fn new(exclude: &[String], include: &[String]) -> Result<Self> {
        Ok(Self {
            exclude: build_set(exclude)?,
            include: build_set(include)?,
        })
    }

    /// A case matching any exclude pattern is always skipped, regardless of
    /// include patterns.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.as_ref().is_some_and(|set| set.is_match(path))
    }

    /// Vacuously true when no include patterns were given.
    pub fn is_included(&self, path: &str) -> bool {
        self.include.as_ref().is_none_or(|set| set.is_match(path))
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid case filter pattern '{pattern}'"))?;
        builder.add(glob);
    }
    let set = builder.build().context("compiling case filter patterns")?;
    Ok(Some(set))
}
