//! Composer-style PHP version constraint matching.
//!
//! Constraints are matched against the set of installed `major.minor`
//! versions, never against a remote package index. Only the handful of forms
//! that show up in real `composer.json` `require.php` entries are supported;
//! anything else falls back to "first version number found, treated as a
//! lower bound".

use std::cmp::Ordering;

use regex::Regex;

use crate::version::compare_versions;

/// `>=X.Y <A.B` half-open range.
const RANGE_PATTERN: &str = r"^>=\s*(\d+\.\d+)(?:\.\d+)?\s+<\s*(\d+\.\d+)";
/// `^X.Y[.Z]` or `~X.Y[.Z]`, both widened to the next major.
const CARET_TILDE_PATTERN: &str = r"^([~^])(\d+\.\d+)(?:\.\d+)?$";
/// `>=X.Y` lower bound.
const AT_LEAST_PATTERN: &str = r"^>=\s*(\d+\.\d+)";
/// `X.Y.*` pinned minor.
const WILDCARD_PATTERN: &str = r"^(\d+\.\d+)\.\*$";
/// Bare `X.Y` or `X.Y.Z`, pinned minor.
const EXACT_PATTERN: &str = r"^(\d+\.\d+)(?:\.\d+)?$";
/// Last resort: any `X.Y` substring, treated as a lower bound.
const ANY_VERSION_PATTERN: &str = r"(\d+\.\d+)";

/// Returns the highest installed version satisfying a Composer-style
/// constraint, or `None` when nothing matches.
///
/// OR-combinators (`|` and `||`) are unions: the best match across all parts
/// wins, compared numerically.
pub fn match_constraint(constraint: &str, installed: &[String]) -> Option<String> {
    let normalized = constraint.replace("||", "|");

    let mut best: Option<String> = None;
    for part in normalized.split('|') {
        if let Some(found) = match_single_constraint(part.trim(), installed) {
            let improves = best
                .as_deref()
                .map_or(true, |b| compare_versions(&found, b) == Ordering::Greater);
            if improves {
                best = Some(found);
            }
        }
    }
    best
}

fn match_single_constraint(constraint: &str, installed: &[String]) -> Option<String> {
    let constraint = constraint.trim();

    // ">=8.2 <8.5"
    if let Some(groups) = capture(RANGE_PATTERN, constraint) {
        return highest_in_range(installed, &groups[0], &groups[1]);
    }

    // "^8.2" / "~8.2" / "~8.2.0": [X.Y, (X+1).0)
    if let Some(groups) = capture(CARET_TILDE_PATTERN, constraint) {
        let floor = &groups[1];
        let major: u64 = floor.split('.').next()?.parse().ok()?;
        let next_major = format!("{}.0", major + 1);
        return highest_in_range(installed, floor, &next_major);
    }

    // ">=8.2"
    if let Some(groups) = capture(AT_LEAST_PATTERN, constraint) {
        return highest_at_least(installed, &groups[0]);
    }

    // "8.2.*"
    if let Some(groups) = capture(WILDCARD_PATTERN, constraint) {
        return exact_match(installed, &groups[0]);
    }

    // "8.2" or "8.2.1"
    if let Some(groups) = capture(EXACT_PATTERN, constraint) {
        return exact_match(installed, &groups[0]);
    }

    // Fallback: pull out any version number and treat it as a lower bound.
    if let Some(groups) = capture(ANY_VERSION_PATTERN, constraint) {
        return highest_at_least(installed, &groups[0]);
    }

    None
}

/// Runs `pattern` against `text` and returns the capture groups as strings.
fn capture(pattern: &str, text: &str) -> Option<Vec<String>> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(text)?;
    Some(
        caps.iter()
            .skip(1)
            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect(),
    )
}

/// Highest installed version in `[floor, ceiling)`.
fn highest_in_range(installed: &[String], floor: &str, ceiling: &str) -> Option<String> {
    installed
        .iter()
        .filter(|v| {
            compare_versions(v, floor) != Ordering::Less
                && compare_versions(v, ceiling) == Ordering::Less
        })
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
}

/// Highest installed version `>= floor`.
fn highest_at_least(installed: &[String], floor: &str) -> Option<String> {
    installed
        .iter()
        .filter(|v| compare_versions(v, floor) != Ordering::Less)
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
}

fn exact_match(installed: &[String], version: &str) -> Option<String> {
    installed.iter().find(|v| v.as_str() == version).cloned()
}
