//! Workload data model.
//!
//! A [`Workload`] is one running unit (container or VM) on a managed host,
//! together with the image metadata and the last update-detection result
//! computed for it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One running unit on a managed host, tracked by a watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Backend-assigned identifier, unique within a watcher.
    pub id: String,

    /// Identifier of the owning watcher.
    pub watcher: String,

    /// Workload name.
    pub name: String,

    /// Runtime status as last observed on the host.
    pub status: WorkloadStatus,

    /// Optional regex: only tags matching it are considered candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<String>,

    /// Optional regex: tags matching it are dropped from the candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_tags: Option<String>,

    /// Optional `<regex> => <replacement>` formula applied to tags before
    /// semver comparison.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_tags: Option<String>,

    /// Optional link template rendered against the current/result tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_template: Option<String>,

    /// Labels attached to the workload on the host.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Image metadata.
    pub image: Image,

    /// Last-computed candidate from the registry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<UpdateResult>,

    /// Whether an update is available. Derived from `image` and `result`;
    /// refreshed via [`Workload::refresh_update_state`], never set directly.
    #[serde(default)]
    pub update_available: bool,

    /// Classification of the available update.
    #[serde(default)]
    pub update_kind: UpdateKind,

    /// Rendered link for the current/result tag, if a template is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Error recorded by the last detection attempt, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkloadError>,
}

impl Workload {
    /// Returns the `watcher_name` display identifier for this workload.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.watcher, self.name)
    }
}

/// Runtime status of a workload on its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadStatus {
    /// Created but never started.
    Created,
    /// Currently running.
    Running,
    /// Paused.
    Paused,
    /// Restarting.
    Restarting,
    /// Exited.
    Exited,
    /// Dead.
    Dead,
    /// The owning host could not be reached during the last cycle.
    Unreachable,
    /// Status could not be determined.
    #[default]
    Unknown,
}

impl WorkloadStatus {
    /// Parses a backend-reported status string, defaulting to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            "unreachable" => Self::Unreachable,
            _ => Self::Unknown,
        }
    }
}

/// Image metadata for a workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Backend image id (config hash).
    pub id: String,

    /// Repository path within the registry (e.g. `library/nginx`).
    pub name: String,

    /// Owning registry, resolved at normalization time.
    pub registry: ImageRegistry,

    /// Current tag.
    pub tag: ImageTag,

    /// Digest-watching state.
    pub digest: ImageDigest,

    /// Image architecture (e.g. `amd64`).
    pub architecture: String,

    /// Image operating system (e.g. `linux`).
    pub os: String,

    /// Platform variants advertised for the image.
    #[serde(default)]
    pub variants: Vec<String>,

    /// Image creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Registry ownership of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegistry {
    /// Short name of the resolved provider, or `unknown`.
    pub name: String,

    /// Fully-qualified, scheme-prefixed API root after normalization.
    pub url: String,
}

impl ImageRegistry {
    /// Name used when no provider recognizes the image.
    pub const UNKNOWN: &'static str = "unknown";
}

/// Tag state of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTag {
    /// Tag value (e.g. `1.2.3`).
    pub value: String,

    /// Whether the tag parses as a semantic version (after transform).
    pub semver: bool,
}

/// Digest-watching state of an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDigest {
    /// Whether the digest is tracked for this image.
    pub watch: bool,

    /// Local comparison digest, resolved during version finding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Repo digest reported by the host for the running image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// Candidate computed against the registry during the last watch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Adopted candidate tag (the current tag when no candidate exists).
    pub tag: String,

    /// Remote manifest digest, when digest watching is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Remote creation timestamp, when the registry reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl UpdateResult {
    /// Creates a result carrying only a tag.
    #[must_use]
    pub fn tag_only(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            digest: None,
            created: None,
        }
    }
}

/// Classification of an available update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKind {
    /// What kind of change was detected.
    pub kind: UpdateCategory,

    /// Local value being compared (tag or digest).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_value: Option<String>,

    /// Remote value being compared (tag or digest).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<String>,

    /// Semver severity of a tag change, when computable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semver_diff: Option<SemverDiff>,
}

/// Kind of change detected between local and remote state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCategory {
    /// No update, or the change could not be classified.
    #[default]
    Unknown,
    /// The candidate tag differs from the current tag.
    Tag,
    /// The remote digest differs from the local digest.
    Digest,
}

/// Severity of a semantic-version difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemverDiff {
    /// Severity could not be determined.
    Unknown,
    /// Major version change.
    Major,
    /// Minor version change.
    Minor,
    /// Patch version change.
    Patch,
    /// Prerelease-only change.
    Prerelease,
}

/// Non-fatal error recorded on a workload when a detection attempt fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadError {
    /// Human-readable error message.
    pub message: String,
}

impl WorkloadError {
    /// Creates an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workload() -> Workload {
        Workload {
            id: "c0ffee".to_string(),
            watcher: "docker-host1".to_string(),
            name: "nginx".to_string(),
            status: WorkloadStatus::Running,
            include_tags: None,
            exclude_tags: None,
            transform_tags: None,
            link_template: None,
            labels: HashMap::new(),
            image: Image {
                id: "sha256:abc".to_string(),
                name: "library/nginx".to_string(),
                registry: ImageRegistry {
                    name: "hub".to_string(),
                    url: "https://registry-1.docker.io/v2".to_string(),
                },
                tag: ImageTag {
                    value: "1.2.3".to_string(),
                    semver: true,
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
    fn test_full_name() {
        let workload = sample_workload();
        assert_eq!(workload.full_name(), "docker-host1_nginx");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(WorkloadStatus::parse("running"), WorkloadStatus::Running);
        assert_eq!(WorkloadStatus::parse("Exited"), WorkloadStatus::Exited);
        assert_eq!(WorkloadStatus::parse("weird"), WorkloadStatus::Unknown);
    }

    #[test]
    fn test_serde_round_trip() {
        let workload = sample_workload();
        let json = serde_json::to_string(&workload).unwrap();
        assert!(json.contains("updateAvailable"));
        let back: Workload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, workload.id);
        assert_eq!(back.image.tag.value, "1.2.3");
    }

    #[test]
    fn test_update_kind_default_is_unknown() {
        let kind = UpdateKind::default();
        assert_eq!(kind.kind, UpdateCategory::Unknown);
        assert!(kind.local_value.is_none());
        assert!(kind.semver_diff.is_none());
    }
}
