//! Numeric version-string comparison.

use std::cmp::Ordering;

/// Compare version strings like `"8.3"` and `"8.10"` component-wise
/// numerically, so `8.10 > 8.9`. When all shared components are equal the
/// longer string wins (`8.3.1 > 8.3`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<u64> = numeric_parts(a);
    let b_parts: Vec<u64> = numeric_parts(b);

    for (x, y) in a_parts.iter().zip(&b_parts) {
        match x.cmp(y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a_parts.len().cmp(&b_parts.len())
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

/// Sort versions ascending, lowest first.
pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by(|a, b| compare_versions(a, b));
}
