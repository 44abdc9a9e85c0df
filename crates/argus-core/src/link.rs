//! Link template rendering.
//!
//! Templates may reference `${raw}` (the tag value) and, for semver tags,
//! `${major}`, `${minor}`, `${patch}` and `${prerelease}`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tag;
use crate::workload::Workload;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*(raw|major|minor|patch|prerelease)\s*\}").expect("valid"));

/// Renders a link template against a tag value.
///
/// Returns `None` when the template is absent.
#[must_use]
pub fn render_link(template: Option<&str>, tag_value: &str, is_semver: bool) -> Option<String> {
    let template = template?;
    let version = if is_semver {
        tag::parse_semver(tag_value)
    } else {
        None
    };
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &regex::Captures<'_>| {
        match (&caps[1], &version) {
            ("raw", _) => tag_value.to_string(),
            ("major", Some(v)) => v.major.to_string(),
            ("minor", Some(v)) => v.minor.to_string(),
            ("patch", Some(v)) => v.patch.to_string(),
            ("prerelease", Some(v)) => v.pre.as_str().to_string(),
            // Unresolvable semver placeholder on a non-semver tag
            _ => caps[0].to_string(),
        }
    });
    Some(rendered.into_owned())
}

/// Computes the rendered link for a workload, preferring the current tag and
/// falling back to the result tag.
#[must_use]
pub fn workload_link(workload: &Workload) -> Option<String> {
    let formula = workload.transform_tags.as_deref();
    let template = workload.link_template.as_deref()?;
    let tag_value = tag::transform_tag(formula, &workload.image.tag.value);
    render_link(Some(template), &tag_value, workload.image.tag.semver)
}
