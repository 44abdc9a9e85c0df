//! Workload label keys and opt-in parsing.
//!
//! Per-workload configuration travels as labels on the workload itself, so a
//! compose file can opt a single container in or out of watching without
//! touching the watcher configuration.

/// Tri-state watch opt-in label (`true`/`false`, unset defers to the
/// watcher's default).
pub const WATCH: &str = "argus.watch";

/// Tri-state digest-watch override label.
pub const WATCH_DIGEST: &str = "argus.watch.digest";

/// Include-tags regex label.
pub const TAG_INCLUDE: &str = "argus.tag.include";

/// Exclude-tags regex label.
pub const TAG_EXCLUDE: &str = "argus.tag.exclude";

/// Tag transform formula label (`<regex> => <replacement>`).
pub const TAG_TRANSFORM: &str = "argus.tag.transform";

/// Link template label.
pub const LINK_TEMPLATE: &str = "argus.link.template";

/// Returns true when the workload must be watched.
///
/// An explicit non-empty label value overrides the watcher-level default in
/// either direction; an absent or empty value defers to it.
#[must_use]
pub fn is_workload_to_watch(label_value: Option<&str>, watch_by_default: bool) -> bool {
    match label_value.filter(|v| !v.is_empty()) {
        Some(value) => value.eq_ignore_ascii_case("true"),
        None => watch_by_default,
    }
}
