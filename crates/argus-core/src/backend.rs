//! Backend-connection collaborator trait.
//!
//! A [`ContainerBackend`] is the API of one managed host's container engine
//! or hypervisor. The transport behind it (SSH tunneling, TLS) is out of
//! scope here; implementations receive an already-configured connection.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::workload::WorkloadStatus;

/// A workload as listed by the backend, before enrichment.
#[derive(Debug, Clone)]
pub struct DiscoveredWorkload {
    /// Backend-assigned id.
    pub id: String,

    /// Workload name.
    pub name: String,

    /// Image reference the workload was started from.
    pub image: String,

    /// Runtime status.
    pub status: WorkloadStatus,

    /// Labels attached to the workload.
    pub labels: HashMap<String, String>,
}

/// Image metadata as reported by the backend.
#[derive(Debug, Clone)]
pub struct ImageInspect {
    /// Image id (config hash).
    pub id: String,

    /// Architecture (e.g. `amd64`).
    pub architecture: String,

    /// Operating system (e.g. `linux`).
    pub os: String,

    /// Platform variants the image is available for.
    pub variants: Vec<String>,

    /// Creation timestamp.
    pub created: Option<DateTime<Utc>>,

    /// Repo tags known for the image.
    pub repo_tags: Vec<String>,

    /// Repo digests known for the image (`name@sha256:…`).
    pub repo_digests: Vec<String>,
}

impl ImageInspect {
    /// Returns the first repo digest with its repository prefix stripped.
    #[must_use]
    pub fn repo_digest(&self) -> Option<String> {
        self.repo_digests
            .first()
            .and_then(|full| full.split('@').nth(1))
            .map(ToString::to_string)
    }
}

/// A runtime stats sample for one workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStats {
    /// CPU usage percentage, when computable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,

    /// Memory usage in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,

    /// Memory limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,

    /// Collection timestamp.
    pub collected_at: DateTime<Utc>,
}

/// A live event emitted by the backend.
#[derive(Debug, Clone)]
pub struct BackendEvent {
    /// Event kind.
    pub kind: BackendEventKind,

    /// Affected workload id, when the event targets one.
    pub workload_id: Option<String>,
}

/// Kinds of backend events relevant to watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEventKind {
    /// A workload was created.
    Created,
    /// A workload was started.
    Started,
    /// A workload was stopped.
    Stopped,
    /// A workload was destroyed.
    Destroyed,
    /// A workload was updated in place.
    Updated,
    /// Any other event.
    Other,
}

/// Host container/hypervisor API consumed by a watcher.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Verifies the backend connection.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Lists workloads on the host. With `all` set, stopped workloads are
    /// included.
    async fn list_workloads(&self, all: bool) -> Result<Vec<DiscoveredWorkload>, BackendError>;

    /// Inspects an image by reference or id.
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, BackendError>;

    /// Returns the local image-config hash for an image, used as the
    /// comparison digest for legacy single-manifest registries.
    async fn image_config_digest(&self, image_id: &str) -> Result<Option<String>, BackendError>;

    /// Fetches a runtime stats sample for a workload.
    async fn workload_stats(&self, workload_id: &str) -> Result<WorkloadStats, BackendError>;

    /// Subscribes to the backend's live event stream.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BackendEvent>, BackendError>;
}
