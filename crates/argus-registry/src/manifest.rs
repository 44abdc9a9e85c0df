//! Distribution API wire types.
//!
//! Deserialization targets for the `tags/list` and `manifests` endpoints,
//! covering schema v2 manifest lists, single v2 manifests and legacy schema
//! v1 manifests.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Media types used when negotiating manifest responses.
pub mod media_type {
    /// Docker manifest list (schema v2).
    pub const MANIFEST_LIST_V2: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

    /// OCI image index.
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    /// Docker single manifest (schema v2).
    pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

    /// OCI image manifest.
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

    /// Docker container image config.
    pub const CONTAINER_CONFIG_V1: &str = "application/vnd.docker.container.image.v1+json";

    /// OCI image config.
    pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
}

/// Response from the `/v2/<name>/tags/list` endpoint.
#[derive(Debug, Deserialize)]
pub struct TagList {
    /// Repository name.
    pub name: Option<String>,

    /// Tags, absent for empty repositories on some registries.
    pub tags: Option<Vec<String>>,
}

/// Response from the `/v2/<name>/manifests/<reference>` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    /// Manifest schema version (1 or 2).
    pub schema_version: u64,

    /// Media type of the response.
    pub media_type: Option<String>,

    /// Per-platform manifests, for manifest lists and indexes.
    pub manifests: Option<Vec<ManifestRef>>,

    /// Config descriptor, for single v2 manifests.
    pub config: Option<ManifestConfig>,

    /// History entries, for legacy schema v1 manifests.
    pub history: Option<Vec<V1History>>,
}

/// One per-platform entry of a manifest list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRef {
    /// Manifest digest.
    pub digest: String,

    /// Manifest media type.
    pub media_type: Option<String>,

    /// Target platform.
    pub platform: Option<Platform>,
}

/// Target platform of a manifest-list entry.
#[derive(Debug, Deserialize)]
pub struct Platform {
    /// CPU architecture.
    pub architecture: String,

    /// Operating system.
    pub os: String,

    /// Architecture variant.
    pub variant: Option<String>,
}

/// Config descriptor of a single v2 manifest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfig {
    /// Config blob digest.
    pub digest: String,

    /// Config media type.
    pub media_type: Option<String>,
}

/// One history entry of a legacy schema v1 manifest.
#[derive(Debug, Deserialize)]
pub struct V1History {
    /// Embedded JSON document describing the layer.
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

/// Parsed `v1Compatibility` document.
#[derive(Debug, Deserialize)]
pub struct V1Compat {
    /// Layer config.
    pub config: Option<V1CompatConfig>,

    /// Creation timestamp.
    pub created: Option<DateTime<Utc>>,
}

/// Config section of a `v1Compatibility` document.
#[derive(Debug, Deserialize)]
pub struct V1CompatConfig {
    /// Parent image config hash.
    #[serde(rename = "Image")]
    pub image: Option<String>,
}

/// Resolved manifest digest handed back to the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDigest {
    /// Digest value, when the registry reports one.
    pub digest: Option<String>,

    /// Creation timestamp, for legacy v1 manifests.
    pub created: Option<DateTime<Utc>>,

    /// Manifest generation: 1 for legacy single-manifest registries,
    /// 2 for manifest-list capable registries.
    pub version: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_list_deserialization() {
        let json = r#"{"name": "org/app", "tags": ["1.0.0", "1.1.0", "latest"]}"#;
        let list: TagList = serde_json::from_str(json).unwrap();
        assert_eq!(list.tags.unwrap().len(), 3);
    }

    #[test]
    fn test_tag_list_null_tags() {
        let json = r#"{"name": "org/app", "tags": null}"#;
        let list: TagList = serde_json::from_str(json).unwrap();
        assert!(list.tags.is_none());
    }

    #[test]
    fn test_manifest_list_deserialization() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
            "manifests": [
                {
                    "digest": "sha256:aaa",
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "platform": {"architecture": "amd64", "os": "linux"}
                },
                {
                    "digest": "sha256:bbb",
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "platform": {"architecture": "arm", "os": "linux", "variant": "v7"}
                }
            ]
        }"#;
        let manifest: ManifestResponse = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.schema_version, 2);
        let manifests = manifest.manifests.unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(
            manifests[1].platform.as_ref().unwrap().variant.as_deref(),
            Some("v7")
        );
    }

    #[test]
    fn test_v1_manifest_deserialization() {
        let json = r#"{
            "schemaVersion": 1,
            "history": [
                {"v1Compatibility": "{\"config\":{\"Image\":\"sha256:ccc\"},\"created\":\"2020-01-01T00:00:00Z\"}"}
            ]
        }"#;
        let manifest: ManifestResponse = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.schema_version, 1);
        let history = manifest.history.unwrap();
        let compat: V1Compat = serde_json::from_str(&history[0].v1_compatibility).unwrap();
        assert_eq!(compat.config.unwrap().image.as_deref(), Some("sha256:ccc"));
        assert!(compat.created.is_some());
    }
}
