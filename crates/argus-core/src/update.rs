//! Update classification.
//!
//! Pure functions deciding whether a workload has an update available and of
//! what kind. `update_available` is always derived from `image` and `result`;
//! callers refresh it through [`Workload::refresh_update_state`].

use crate::link;
use crate::tag;
use crate::workload::{SemverDiff, UpdateCategory, UpdateKind, Workload};

/// Decides whether an image's digest should be tracked.
///
/// Semver images default to tag tracking only, unless the label explicitly
/// requests digest watching. Non-semver images default to digest watching,
/// unless the label explicitly disables it.
#[must_use]
pub fn is_digest_to_watch(label_value: Option<&str>, is_semver: bool) -> bool {
    let explicit = label_value
        .filter(|v| !v.is_empty())
        .map(|v| v.eq_ignore_ascii_case("true"));
    match explicit {
        Some(wanted) => wanted,
        None => !is_semver,
    }
}

impl Workload {
    /// Derives whether an update is available from `image` and `result`.
    ///
    /// Digest comparison takes precedence when digest watching is enabled and
    /// both digests are known. Otherwise the transformed local tag is compared
    /// to the transformed result tag, ORed with a creation-timestamp
    /// comparison when both timestamps are present (a legacy-manifest
    /// fallback signal).
    #[must_use]
    pub fn compute_update_available(&self) -> bool {
        let Some(result) = &self.result else {
            return false;
        };

        if self.image.digest.watch {
            if let (Some(local), Some(remote)) = (&self.image.digest.value, &result.digest) {
                return local != remote;
            }
        }

        let formula = self.transform_tags.as_deref();
        let local_tag = tag::transform_tag(formula, &self.image.tag.value);
        let remote_tag = tag::transform_tag(formula, &result.tag);
        let mut update_available = local_tag != remote_tag;

        if let (Some(created), Some(result_created)) = (self.image.created, result.created) {
            update_available = update_available || created != result_created;
        }
        update_available
    }

    /// Classifies the available update.
    ///
    /// Returns the `unknown` kind unless an update is available. A differing
    /// tag is classified as `tag` (with a semver severity when the image is
    /// semver); otherwise a differing digest is classified as `digest`.
    #[must_use]
    pub fn compute_update_kind(&self) -> UpdateKind {
        let mut kind = UpdateKind::default();
        let Some(result) = &self.result else {
            return kind;
        };
        if !self.compute_update_available() {
            return kind;
        }

        if self.image.tag.value != result.tag {
            kind.kind = UpdateCategory::Tag;
            kind.local_value = Some(self.image.tag.value.clone());
            kind.remote_value = Some(result.tag.clone());
            let severity = if self.image.tag.semver {
                let formula = self.transform_tags.as_deref();
                tag::diff(
                    &tag::transform_tag(formula, &self.image.tag.value),
                    &tag::transform_tag(formula, &result.tag),
                )
                .unwrap_or(SemverDiff::Unknown)
            } else {
                SemverDiff::Unknown
            };
            kind.semver_diff = Some(severity);
        } else if self.image.digest.value != result.digest {
            kind.kind = UpdateCategory::Digest;
            kind.local_value = self.image.digest.value.clone();
            kind.remote_value = result.digest.clone();
        }
        kind
    }

    /// Recomputes the derived update fields (`update_available`,
    /// `update_kind`, `link`) from the current `image` and `result`.
    pub fn refresh_update_state(&mut self) {
        self.update_available = self.compute_update_available();
        self.update_kind = self.compute_update_kind();
        self.link = link::workload_link(self);
    }

    /// Returns true when the fresh result differs from a previously persisted
    /// one (or no previous record exists).
    #[must_use]
    pub fn has_result_changed(&self, previous: Option<&Self>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        self.result != previous.result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::workload::{
        Image, ImageDigest, ImageRegistry, ImageTag, UpdateResult, WorkloadStatus,
    };

    fn workload(tag_value: &str, semver: bool) -> Workload {
        Workload {
            id: "1".to_string(),
            watcher: "docker-host1".to_string(),
            name: "app".to_string(),
            status: WorkloadStatus::Running,
            include_tags: None,
            exclude_tags: None,
            transform_tags: None,
            link_template: None,
            labels: HashMap::new(),
            image: Image {
                id: "sha256:abc".to_string(),
                name: "org/app".to_string(),
                registry: ImageRegistry {
                    name: "hub".to_string(),
                    url: "https://registry-1.docker.io/v2".to_string(),
                },
                tag: ImageTag {
                    value: tag_value.to_string(),
                    semver,
                },
                digest: ImageDigest::default(),
                architecture: "amd64".to_string(),
                os: "linux".to_string(),
                variants: vec![],
                created: None,
            },
            result: None,
            update_available: false,
            update_kind: UpdateKind::default(),
            link: None,
            error: None,
        }
    }

    #[test]
    fn test_digest_watch_defaults() {
        assert!(!is_digest_to_watch(None, true));
        assert!(is_digest_to_watch(None, false));
        assert!(is_digest_to_watch(Some("true"), true));
        assert!(!is_digest_to_watch(Some("false"), false));
        assert!(is_digest_to_watch(Some(""), false));
    }

    #[test]
    fn test_no_result_means_no_update() {
        let w = workload("1.2.3", true);
        assert!(!w.compute_update_available());
        assert_eq!(w.compute_update_kind().kind, UpdateCategory::Unknown);
    }

    #[test]
    fn test_tag_update_with_patch_diff() {
        let mut w = workload("1.2.3", true);
        w.result = Some(UpdateResult::tag_only("1.2.4"));
        assert!(w.compute_update_available());

        let kind = w.compute_update_kind();
        assert_eq!(kind.kind, UpdateCategory::Tag);
        assert_eq!(kind.local_value.as_deref(), Some("1.2.3"));
        assert_eq!(kind.remote_value.as_deref(), Some("1.2.4"));
        assert_eq!(kind.semver_diff, Some(SemverDiff::Patch));
    }

    #[test]
    fn test_digest_comparison_takes_precedence() {
        let mut w = workload("latest", false);
        w.image.digest = ImageDigest {
            watch: true,
            value: Some("sha:a".to_string()),
            repo: Some("sha:a".to_string()),
        };
        w.result = Some(UpdateResult {
            tag: "latest".to_string(),
            digest: Some("sha:b".to_string()),
            created: None,
        });
        assert!(w.compute_update_available());

        let kind = w.compute_update_kind();
        assert_eq!(kind.kind, UpdateCategory::Digest);
        assert_eq!(kind.local_value.as_deref(), Some("sha:a"));
        assert_eq!(kind.remote_value.as_deref(), Some("sha:b"));
    }

    #[test]
    fn test_matching_digests_mean_no_update() {
        let mut w = workload("latest", false);
        w.image.digest = ImageDigest {
            watch: true,
            value: Some("sha:a".to_string()),
            repo: Some("sha:a".to_string()),
        };
        w.result = Some(UpdateResult {
            tag: "latest".to_string(),
            digest: Some("sha:a".to_string()),
            created: None,
        });
        assert!(!w.compute_update_available());
    }

    #[test]
    fn test_created_timestamp_fallback() {
        let mut w = workload("latest", false);
        w.image.created = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        w.result = Some(UpdateResult {
            tag: "latest".to_string(),
            digest: None,
            created: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        });
        assert!(w.compute_update_available());
    }

    #[test]
    fn test_idempotent_classification() {
        let mut w = workload("1.2.3", true);
        w.result = Some(UpdateResult::tag_only("1.2.4"));
        let first = w.compute_update_available();
        let second = w.compute_update_available();
        assert_eq!(first, second);
    }

    #[test]
    fn test_refresh_update_state() {
        let mut w = workload("1.2.3", true);
        w.result = Some(UpdateResult::tag_only("2.0.0"));
        w.refresh_update_state();
        assert!(w.update_available);
        assert_eq!(w.update_kind.kind, UpdateCategory::Tag);
        assert_eq!(w.update_kind.semver_diff, Some(SemverDiff::Major));
    }

    #[test]
    fn test_has_result_changed() {
        let mut w = workload("1.2.3", true);
        w.result = Some(UpdateResult::tag_only("1.2.4"));

        assert!(w.has_result_changed(None));

        let mut previous = w.clone();
        assert!(!w.has_result_changed(Some(&previous)));

        previous.result = Some(UpdateResult::tag_only("1.2.3"));
        assert!(w.has_result_changed(Some(&previous)));
    }
}
