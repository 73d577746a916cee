//! Catalog version ordering.
//!
//! Catalog versions are free-form strings. Strings that parse as semver
//! (optionally prefixed with `v`) compare by semver precedence and rank
//! above everything else. The rest compare segment-wise, splitting on `.`
//! and `-`, with numeric segments compared as numbers.

use std::cmp::Ordering;

/// Parse a version string as semver, tolerating a leading `v`.
#[must_use]
pub fn parse_semver(version: &str) -> Option<semver::Version> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    semver::Version::parse(trimmed).ok()
}

/// Compare two catalog versions.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => compare_segments(a, b),
    }
}

/// Whether a requested version selects a catalog version.
///
/// Exact string equality always matches. Otherwise both sides must parse as
/// semver and be equal (`v1.2.0` selects `1.2.0`).
#[must_use]
pub fn versions_match(requested: &str, candidate: &str) -> bool {
    if requested == candidate {
        return true;
    }
    match (parse_semver(requested), parse_semver(candidate)) {
        (Some(r), Some(c)) => r == c,
        _ => false,
    }
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> Vec<String> {
        s.split(['.', '-'])
            .map(str::to_string)
            .collect::<Vec<_>>()
    };
    let left = split(a);
    let right = split(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_precedence() {
        assert_eq!(compare_versions("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0.0", "1.99.99"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("v1.2.0", "1.2.0"), Ordering::Equal);
    }

    #[test]
    fn semver_ranks_above_free_form() {
        assert_eq!(compare_versions("0.0.1", "latest"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "0.1.0"), Ordering::Less);
    }

    #[test]
    fn free_form_segments() {
        assert_eq!(compare_versions("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("2024.1", "2023.12"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.1"), Ordering::Less);
        assert_eq!(compare_versions("alpha", "beta"), Ordering::Less);
    }

    #[test]
    fn matching() {
        assert!(versions_match("1.2.0", "1.2.0"));
        assert!(versions_match("v1.2.0", "1.2.0"));
        assert!(!versions_match("1.2", "1.2.0"));
        assert!(versions_match("nightly", "nightly"));
        assert!(!versions_match("1.2.1", "1.2.0"));
    }
}
