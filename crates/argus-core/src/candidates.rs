//! Tag candidate selection.
//!
//! Given the full tag list of a workload's repository, filters and ranks the
//! tags that qualify as upgrade candidates. The first element of the returned
//! list, if any, is the adopted candidate for the cycle.

use regex::Regex;

use crate::tag;
use crate::workload::Workload;

/// Filters and ranks candidate tags for a workload.
///
/// Applies, in order: the `include_tags` regex, the `exclude_tags` regex,
/// semver-only filtering (non-semver workloads never receive tag candidates),
/// the greater-or-equal cutoff against the current tag, and a descending
/// semver sort. All comparisons operate on transformed tag values.
///
/// A malformed include/exclude regex disables that filter with a warning
/// rather than failing the cycle.
#[must_use]
pub fn tag_candidates(workload: &Workload, tags: &[String]) -> Vec<String> {
    tracing::debug!(
        workload = %workload.full_name(),
        count = tags.len(),
        "Selecting tag candidates"
    );
    let mut filtered: Vec<String> = tags.to_vec();

    if let Some(include) = workload.include_tags.as_deref() {
        match Regex::new(include) {
            Ok(re) => filtered.retain(|t| re.is_match(t)),
            Err(_) => {
                tracing::warn!(include, "Invalid include regex, skipping include filter");
            }
        }
    }

    if let Some(exclude) = workload.exclude_tags.as_deref() {
        match Regex::new(exclude) {
            Ok(re) => filtered.retain(|t| !re.is_match(t)),
            Err(_) => {
                tracing::warn!(exclude, "Invalid exclude regex, skipping exclude filter");
            }
        }
    }

    // Non-semver images never receive tag-based suggestions; they rely on
    // digest watching instead.
    if !workload.image.tag.semver {
        return Vec::new();
    }

    let formula = workload.transform_tags.as_deref();
    let current = tag::transform_tag(formula, &workload.image.tag.value);

    filtered.retain(|t| tag::parse_semver(&tag::transform_tag(formula, t)).is_some());
    filtered.retain(|t| tag::is_greater_or_equal(&tag::transform_tag(formula, t), &current));

    // Every survivor parses; sort on the transformed versions, descending.
    filtered.sort_by(|t1, t2| {
        let v1 = tag::parse_semver(&tag::transform_tag(formula, t1));
        let v2 = tag::parse_semver(&tag::transform_tag(formula, t2));
        v2.cmp(&v1)
    });
    filtered
}
