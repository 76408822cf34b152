// src/engine/validate.rs

//! Case output validation against the spec's declared success predicate.

use std::fs;

use regex::Regex;
use tracing::warn;

use crate::project::TestCase;

/// Check whether a case's output already satisfies its `validator` section.
///
/// A case without one is unconditionally valid. Every `exists` path must be
/// present under the case dir; every `contains` entry needs its file present
/// and its text matching the regex somewhere (substring search). The first
/// failing check wins; unreadable files and broken patterns count as
/// invalid.
pub fn validate_case(case: &TestCase) -> bool {
    let Some(validator) = &case.spec.validator else {
        return true;
    };
    for rel in &validator.exists {
        if !case.dir.join(rel).exists() {
            return false;
        }
    }
    for (rel, pattern) in &validator.contains {
        let path = case.dir.join(rel);
        let Ok(text) = fs::read_to_string(&path) else {
            return false;
        };
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(&text) {
                    return false;
                }
            }
            Err(err) => {
                warn!(case = %case.rel_path, pattern, error = %err, "invalid validator regex");
                return false;
            }
        }
    }
    true
}
