//! Integration tests for full watch cycles.
//!
//! Drives a watcher against an in-memory backend, store and a canned
//! registry provider: discovery, enrichment, candidate selection, update
//! classification, per-workload failure isolation and pruning.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc;

use argus_core::{
    BackendError, BackendEvent, ContainerBackend, DiscoveredWorkload, Image, ImageDigest,
    ImageInspect, ImageRef, ImageRegistry, ImageTag, MemoryWorkloadStore, SemverDiff,
    UpdateCategory, UpdateKind, Workload, WorkloadStats, WorkloadStatus, WorkloadStore,
};
use argus_registry::{
    ManifestDigest, ProviderKind, RegistryDirectory, RegistryError, RegistryProvider,
    RequestOptions,
};
use argus_watcher::{BackendKind, Watcher, WatcherConfig, WatcherEngine, WatcherError};

/// Provider serving canned tags and digests for the `registry.test` domain.
struct StaticProvider {
    http: reqwest::Client,
    tags: Vec<String>,
    fail_tags_for: Option<String>,
}

impl StaticProvider {
    fn new(tags: &[&str]) -> Self {
        Self {
            http: reqwest::Client::new(),
            tags: tags.iter().map(ToString::to_string).collect(),
            fail_tags_for: None,
        }
    }

    fn failing_for(mut self, image_name: &str) -> Self {
        self.fail_tags_for = Some(image_name.to_string());
        self
    }
}

#[async_trait]
impl RegistryProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn matches(&self, image: &Image) -> bool {
        argus_registry::registry_host(&image.registry.url) == "registry.test"
    }

    fn normalize_image(&self, mut image: Image) -> Image {
        image.registry.name = self.label();
        image.registry.url = "https://registry.test/v2".to_string();
        image
    }

    async fn authenticate(
        &self,
        _image: &Image,
        options: RequestOptions,
    ) -> Result<RequestOptions, RegistryError> {
        Ok(options)
    }

    fn masked_configuration(&self) -> serde_json::Value {
        json!({})
    }

    async fn get_tags(&self, image: &Image) -> Result<Vec<String>, RegistryError> {
        if self.fail_tags_for.as_deref() == Some(image.name.as_str()) {
            return Err(RegistryError::HttpError {
                status: 500,
                message: "registry exploded".to_string(),
            });
        }
        Ok(self.tags.clone())
    }

    async fn get_manifest_digest(
        &self,
        _image: &Image,
        reference: Option<&str>,
    ) -> Result<ManifestDigest, RegistryError> {
        // The reference form distinguishes the local (repo digest) lookup
        // from the remote (tag) lookup.
        let digest = if reference.is_some() {
            "sha256:local"
        } else {
            "sha256:remote"
        };
        Ok(ManifestDigest {
            digest: Some(digest.to_string()),
            created: None,
            version: 2,
        })
    }
}

/// Backend serving a fixed set of workloads and image metadata.
struct MockBackend {
    workloads: Vec<DiscoveredWorkload>,
    images: HashMap<String, ImageInspect>,
    fail_listing: bool,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            workloads: Vec::new(),
            images: HashMap::new(),
            fail_listing: false,
        }
    }

    fn with_workload(mut self, id: &str, name: &str, image: &str, labels: &[(&str, &str)]) -> Self {
        self.workloads.push(DiscoveredWorkload {
            id: id.to_string(),
            name: name.to_string(),
            image: image.to_string(),
            status: WorkloadStatus::Running,
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        let parsed = ImageRef::parse(image).unwrap();
        self.images.insert(
            image.to_string(),
            ImageInspect {
                id: format!("sha256:image-{id}"),
                architecture: "amd64".to_string(),
                os: "linux".to_string(),
                variants: vec![],
                created: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                repo_tags: vec![image.to_string()],
                repo_digests: vec![format!("{}@sha256:repo-{id}", parsed.path)],
            },
        );
        self
    }

    fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

#[async_trait]
impl ContainerBackend for MockBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn list_workloads(&self, _all: bool) -> Result<Vec<DiscoveredWorkload>, BackendError> {
        if self.fail_listing {
            return Err(BackendError::Unreachable {
                host: "10.0.0.5".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.workloads.clone())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, BackendError> {
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                reference: reference.to_string(),
            })
    }

    async fn image_config_digest(&self, _image_id: &str) -> Result<Option<String>, BackendError> {
        Ok(Some("sha256:local-config".to_string()))
    }

    async fn workload_stats(&self, _workload_id: &str) -> Result<WorkloadStats, BackendError> {
        Ok(WorkloadStats {
            cpu_percent: Some(1.0),
            memory_usage: Some(1024),
            memory_limit: Some(4096),
            collected_at: Utc::now(),
        })
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BackendEvent>, BackendError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}

fn directory_with(provider: StaticProvider) -> Arc<RegistryDirectory> {
    let mut directory = RegistryDirectory::new();
    directory.register(Arc::new(provider)).unwrap();
    Arc::new(directory)
}

fn watcher_with(
    backend: MockBackend,
    store: Arc<MemoryWorkloadStore>,
    directory: Arc<RegistryDirectory>,
) -> Arc<Watcher> {
    Watcher::new(
        "docker-host1",
        WatcherConfig::for_host("10.0.0.5").with_watch_events(false),
        Arc::new(backend),
        store,
        directory,
    )
    .unwrap()
}

fn stored_workload(id: &str, watcher: &str) -> Workload {
    Workload {
        id: id.to_string(),
        watcher: watcher.to_string(),
        name: format!("app-{id}"),
        status: WorkloadStatus::Running,
        include_tags: None,
        exclude_tags: None,
        transform_tags: None,
        link_template: None,
        labels: HashMap::new(),
        image: Image {
            id: "sha256:old".to_string(),
            name: "org/old".to_string(),
            registry: ImageRegistry {
                name: "custom.static".to_string(),
                url: "https://registry.test/v2".to_string(),
            },
            tag: ImageTag {
                value: "1.0.0".to_string(),
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

#[tokio::test]
async fn test_cycle_detects_patch_update() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend =
        MockBackend::new().with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["1.2.4", "1.2.3", "1.0.0"])),
    );

    let summary = watcher.watch_cycle().await;
    assert_eq!(summary.watched, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.updates_available, 1);

    let persisted = store.find_by_id("c1").await.unwrap().unwrap();
    assert_eq!(persisted.watcher, "docker-host1");
    assert_eq!(persisted.image.tag.value, "1.2.3");
    assert!(persisted.image.tag.semver);
    assert_eq!(persisted.result.as_ref().unwrap().tag, "1.2.4");
    assert!(persisted.update_available);
    assert_eq!(persisted.update_kind.kind, UpdateCategory::Tag);
    assert_eq!(persisted.update_kind.semver_diff, Some(SemverDiff::Patch));
    assert!(persisted.error.is_none());
}

#[tokio::test]
async fn test_cycle_without_candidates_reports_no_update() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend =
        MockBackend::new().with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["1.2.3", "1.0.0"])),
    );

    let summary = watcher.watch_cycle().await;
    assert_eq!(summary.updates_available, 0);

    let persisted = store.find_by_id("c1").await.unwrap().unwrap();
    assert_eq!(persisted.result.as_ref().unwrap().tag, "1.2.3");
    assert!(!persisted.update_available);
    assert_eq!(persisted.update_kind.kind, UpdateCategory::Unknown);
}

#[tokio::test]
async fn test_cycle_detects_digest_update_for_non_semver() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend =
        MockBackend::new().with_workload("c1", "mongo", "registry.test/org/mongo:latest", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["latest"])),
    );

    watcher.watch_cycle().await;

    let persisted = store.find_by_id("c1").await.unwrap().unwrap();
    assert!(!persisted.image.tag.semver);
    assert!(persisted.image.digest.watch);
    assert_eq!(persisted.image.digest.value.as_deref(), Some("sha256:local"));
    assert_eq!(
        persisted.result.as_ref().unwrap().digest.as_deref(),
        Some("sha256:remote")
    );
    assert!(persisted.update_available);
    assert_eq!(persisted.update_kind.kind, UpdateCategory::Digest);
    assert_eq!(
        persisted.update_kind.local_value.as_deref(),
        Some("sha256:local")
    );
    assert_eq!(
        persisted.update_kind.remote_value.as_deref(),
        Some("sha256:remote")
    );
}

#[tokio::test]
async fn test_failure_is_isolated_per_workload() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend = MockBackend::new()
        .with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[])
        .with_workload("c2", "flaky", "registry.test/org/flaky:2.0.0", &[]);
    let provider = StaticProvider::new(&["1.2.4", "2.0.0"]).failing_for("org/flaky");
    let watcher = watcher_with(backend, store.clone(), directory_with(provider));

    let summary = watcher.watch_cycle().await;
    assert_eq!(summary.watched, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.updates_available, 1);

    let healthy = store.find_by_id("c1").await.unwrap().unwrap();
    assert!(healthy.error.is_none());
    assert!(healthy.update_available);

    // The failing workload is persisted too, with its error recorded and
    // never hidden from callers.
    let failed = store.find_by_id("c2").await.unwrap().unwrap();
    assert!(failed.error.is_some());
    assert!(failed
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("registry exploded"));
    assert!(!failed.update_available);
}

#[tokio::test]
async fn test_cycle_prunes_stale_workloads() {
    let store = Arc::new(MemoryWorkloadStore::new());
    store
        .upsert(&stored_workload("gone", "docker-host1"))
        .await
        .unwrap();
    let backend =
        MockBackend::new().with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["1.2.3"])),
    );

    watcher.watch_cycle().await;

    assert!(store.find_by_id("gone").await.unwrap().is_none());
    assert!(store.find_by_id("c1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_opted_out_workloads_are_not_watched() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend = MockBackend::new()
        .with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[])
        .with_workload(
            "c2",
            "private",
            "registry.test/org/private:1.0.0",
            &[("argus.watch", "false")],
        );
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["1.2.4"])),
    );

    let summary = watcher.watch_cycle().await;
    assert_eq!(summary.watched, 1);
    assert!(store.find_by_id("c2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_backend_marks_workloads() {
    let store = Arc::new(MemoryWorkloadStore::new());
    store
        .upsert(&stored_workload("c9", "docker-host1"))
        .await
        .unwrap();
    let backend = MockBackend::new().failing_listing();
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&[])),
    );

    let summary = watcher.watch_cycle().await;
    assert_eq!(summary.watched, 0);

    let persisted = store.find_by_id("c9").await.unwrap().unwrap();
    assert_eq!(persisted.status, WorkloadStatus::Unreachable);
}

#[tokio::test]
async fn test_unknown_registry_is_recorded_as_error() {
    let store = Arc::new(MemoryWorkloadStore::new());
    // No provider matches this domain, so normalization marks it unknown.
    let backend =
        MockBackend::new().with_workload("c1", "app", "registry.nowhere.test/org/app:1.0.0", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&[])),
    );

    watcher.watch_cycle().await;

    let persisted = store.find_by_id("c1").await.unwrap().unwrap();
    assert_eq!(persisted.image.registry.name, "unknown");
    assert!(persisted
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("Unsupported registry"));
}

#[tokio::test]
async fn test_engine_lifecycle_and_manual_refresh() {
    let store: Arc<MemoryWorkloadStore> = Arc::new(MemoryWorkloadStore::new());
    let directory = {
        let mut directory = RegistryDirectory::new();
        directory
            .register(Arc::new(StaticProvider::new(&["1.2.4", "1.2.3"])))
            .unwrap();
        Arc::new(directory)
    };
    let engine = WatcherEngine::new(store.clone() as Arc<dyn WorkloadStore>, directory);

    let backend: Arc<dyn ContainerBackend> = Arc::new(MockBackend::new().with_workload(
        "c1",
        "nginx",
        "registry.test/library/nginx:1.2.3",
        &[],
    ));
    let id = engine
        .register_watcher(
            BackendKind::Docker,
            "host1",
            WatcherConfig::for_host("10.0.0.5").with_watch_events(false),
            Arc::clone(&backend),
        )
        .await
        .unwrap();
    assert_eq!(id.to_string(), "watcher.docker.host1");

    // Same identity cannot be registered twice
    let duplicate = engine
        .register_watcher(
            BackendKind::Docker,
            "host1",
            WatcherConfig::for_host("10.0.0.5"),
            Arc::clone(&backend),
        )
        .await;
    assert!(matches!(duplicate, Err(WatcherError::DuplicateWatcher { .. })));

    let summary = engine.trigger_immediate_watch(&id).await.unwrap();
    assert_eq!(summary.watched, 1);
    assert_eq!(summary.updates_available, 1);

    engine.deregister_watcher(&id).await;
    // Deregistration is idempotent
    engine.deregister_watcher(&id).await;

    let unknown = engine.trigger_immediate_watch(&id).await;
    assert!(matches!(unknown, Err(WatcherError::UnknownWatcher { .. })));
}

#[tokio::test]
async fn test_invalid_cron_fails_registration() {
    let store: Arc<dyn WorkloadStore> = Arc::new(MemoryWorkloadStore::new());
    let engine = WatcherEngine::new(store, Arc::new(RegistryDirectory::new()));
    let backend: Arc<dyn ContainerBackend> = Arc::new(MockBackend::new());

    let result = engine
        .register_watcher(
            BackendKind::Docker,
            "host1",
            WatcherConfig::for_host("10.0.0.5").with_cron("not a cron"),
            backend,
        )
        .await;
    assert!(matches!(result, Err(WatcherError::InvalidCron { .. })));
    assert!(engine.watcher_ids().await.is_empty());
}

#[tokio::test]
async fn test_enrichment_reuses_persisted_workloads() {
    let store = Arc::new(MemoryWorkloadStore::new());
    let backend =
        MockBackend::new().with_workload("c1", "nginx", "registry.test/library/nginx:1.2.3", &[]);
    let watcher = watcher_with(
        backend,
        store.clone(),
        directory_with(StaticProvider::new(&["1.2.4", "1.2.3"])),
    );

    watcher.watch_cycle().await;
    let first = store.find_by_id("c1").await.unwrap().unwrap();

    // Second cycle: the workload is served from the store (same image id)
    // and detection still reports the same candidate.
    watcher.watch_cycle().await;
    let second = store.find_by_id("c1").await.unwrap().unwrap();
    assert_eq!(first.image.id, second.image.id);
    assert_eq!(second.result.as_ref().unwrap().tag, "1.2.4");
    assert!(second.update_available);
}
