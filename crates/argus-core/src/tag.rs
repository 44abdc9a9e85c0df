//! Tag engine: semantic-version parsing, ordering, diffing and rewriting.
//!
//! All functions here are pure and total: malformed input never panics and a
//! malformed transform formula falls back to returning the original tag.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::workload::SemverDiff;

static COERCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("coercion pattern is valid")
});

/// Parses a raw tag into a semantic version.
///
/// Tries a strict parse first (tolerating a leading `v`/`V`); on failure,
/// coerces by extracting the first `major[.minor[.patch]]` group and
/// discarding anything after it. Returns `None` only if coercion also fails.
///
/// # Examples
///
/// ```
/// use argus_core::tag::parse_semver;
///
/// assert_eq!(parse_semver("v1.2.3").unwrap().to_string(), "1.2.3");
/// assert_eq!(parse_semver("10.5").unwrap().to_string(), "10.5.0");
/// assert!(parse_semver("latest").is_none());
/// ```
#[must_use]
pub fn parse_semver(raw: &str) -> Option<Version> {
    let cleaned = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(cleaned) {
        return Some(version);
    }
    coerce(raw)
}

/// Coerces a loose version string into `major.minor.patch`.
fn coerce(raw: &str) -> Option<Version> {
    let caps = COERCE_RE.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .map_or(Some(0), |m| m.as_str().parse::<u64>().ok())
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Returns true when `a >= b` under semver ordering.
///
/// Returns false if either value fails to parse.
#[must_use]
pub fn is_greater_or_equal(a: &str, b: &str) -> bool {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a >= b,
        _ => false,
    }
}

/// Computes the severity of the difference between two versions.
///
/// Returns `None` if either value fails to parse or the versions are equal.
#[must_use]
pub fn diff(a: &str, b: &str) -> Option<SemverDiff> {
    let a = parse_semver(a)?;
    let b = parse_semver(b)?;
    if a == b {
        return None;
    }
    if a.major != b.major {
        Some(SemverDiff::Major)
    } else if a.minor != b.minor {
        Some(SemverDiff::Minor)
    } else if a.patch != b.patch {
        Some(SemverDiff::Patch)
    } else {
        Some(SemverDiff::Prerelease)
    }
}

/// Rewrites a tag using a `<regex> => <replacement>` formula.
///
/// The replacement may reference capture groups as `$1`, `$2`, … If the
/// formula is absent or empty, the regex does not match, or the formula is
/// malformed, the original tag is returned unchanged. This function never
/// fails.
///
/// # Examples
///
/// ```
/// use argus_core::tag::transform_tag;
///
/// let out = transform_tag(Some(r"^win-(\d+)\.(\d+)$ => $1.$2.0"), "win-1.2");
/// assert_eq!(out, "1.2.0");
/// assert_eq!(transform_tag(None, "v1"), "v1");
/// assert_eq!(transform_tag(Some("bad(regex => $1"), "v1"), "v1");
/// ```
#[must_use]
pub fn transform_tag(formula: Option<&str>, tag: &str) -> String {
    let Some(formula) = formula.filter(|f| !f.trim().is_empty()) else {
        return tag.to_string();
    };
    let Some((pattern, replacement)) = formula.split_once("=>") else {
        tracing::warn!(formula, "Malformed transform formula, keeping tag as-is");
        return tag.to_string();
    };
    let Ok(re) = Regex::new(pattern.trim()) else {
        tracing::warn!(formula, "Invalid transform regex, keeping tag as-is");
        return tag.to_string();
    };
    let Some(caps) = re.captures(tag) else {
        return tag.to_string();
    };
    let mut transformed = replacement.trim().to_string();
    // Substitute highest group numbers first so $10 is not clobbered by $1.
    for i in (1..caps.len()).rev() {
        if let Some(group) = caps.get(i) {
            transformed = transformed.replace(&format!("${i}"), group.as_str());
        }
    }
    transformed
}
