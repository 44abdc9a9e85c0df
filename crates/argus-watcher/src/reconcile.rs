//! Reconciliation of discovered workloads against the store.
//!
//! Fresh workloads are upserted; previously persisted workloads whose id was
//! not discovered this cycle no longer exist on the host and are pruned.
//! Pruning failures are logged and never block the rest of the cycle.

use std::collections::HashSet;
use std::sync::Arc;

use argus_core::{Workload, WorkloadStore};

/// Outcome of persisting one workload.
#[derive(Debug)]
pub struct WorkloadReport {
    /// The persisted workload.
    pub workload: Workload,

    /// True when the detection result changed since the previous cycle and
    /// an update is available (the signal consumed by automation triggers).
    pub changed: bool,
}

/// Aligns persisted workload records with the current cycle's discoveries.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn WorkloadStore>,
}

impl Reconciler {
    /// Creates a reconciler over a store.
    #[must_use]
    pub fn new(store: Arc<dyn WorkloadStore>) -> Self {
        Self { store }
    }

    /// Persists a watched workload, reporting whether its result changed.
    ///
    /// A workload seen for the first time always counts as changed; a known
    /// workload only when the fresh result differs from the stored one and
    /// an update is available.
    pub async fn persist(&self, workload: Workload) -> WorkloadReport {
        let previous = match self.store.find_by_id(&workload.id).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(
                    workload = %workload.full_name(),
                    error = %e,
                    "Could not read previous record, treating workload as new"
                );
                None
            }
        };
        let changed = match &previous {
            None => {
                tracing::debug!(workload = %workload.full_name(), "Workload watched for the first time");
                true
            }
            Some(previous) => {
                workload.has_result_changed(Some(previous)) && workload.update_available
            }
        };
        if let Err(e) = self.store.upsert(&workload).await {
            tracing::error!(workload = %workload.full_name(), error = %e, "Failed to persist workload");
        }
        WorkloadReport { workload, changed }
    }

    /// Deletes every persisted workload of the watcher whose id was not
    /// discovered this cycle.
    pub async fn prune(&self, watcher: &str, discovered: &[Workload]) {
        let stored = match self.store.find_all_by_watcher(watcher).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(watcher, error = %e, "Could not list stored workloads, skipping pruning");
                return;
            }
        };
        let discovered_ids: HashSet<&str> = discovered.iter().map(|w| w.id.as_str()).collect();
        for stale in stored
            .iter()
            .filter(|s| !discovered_ids.contains(s.id.as_str()))
        {
            tracing::info!(
                workload = %stale.full_name(),
                "Pruning workload no longer present on its host"
            );
            if let Err(e) = self.store.delete_by_id(&stale.id).await {
                tracing::warn!(workload = %stale.full_name(), error = %e, "Failed to prune workload");
            }
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use argus_core::{
        Image, ImageDigest, ImageRegistry, ImageTag, MemoryWorkloadStore, UpdateKind,
        UpdateResult, WorkloadStatus,
    };

    use super::*;

    fn workload(id: &str, watcher: &str) -> Workload {
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
                id: "sha256:abc".to_string(),
                name: "org/app".to_string(),
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

    #[tokio::test]
    async fn test_prune_deletes_undiscovered_ids() {
        let store = Arc::new(MemoryWorkloadStore::new());
        store.upsert(&workload("1", "w1")).await.unwrap();
        store.upsert(&workload("2", "w1")).await.unwrap();

        let reconciler = Reconciler::new(store.clone());
        reconciler.prune("w1", &[workload("1", "w1")]).await;

        assert!(store.find_by_id("1").await.unwrap().is_some());
        assert!(store.find_by_id("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_is_scoped_to_the_watcher() {
        let store = Arc::new(MemoryWorkloadStore::new());
        store.upsert(&workload("1", "w1")).await.unwrap();
        store.upsert(&workload("2", "w2")).await.unwrap();

        let reconciler = Reconciler::new(store.clone());
        reconciler.prune("w1", &[]).await;

        assert!(store.find_by_id("1").await.unwrap().is_none());
        assert!(store.find_by_id("2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_first_persist_is_changed() {
        let store = Arc::new(MemoryWorkloadStore::new());
        let reconciler = Reconciler::new(store.clone());

        let report = reconciler.persist(workload("1", "w1")).await;
        assert!(report.changed);
        assert!(store.find_by_id("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unchanged_result_is_not_reported() {
        let store = Arc::new(MemoryWorkloadStore::new());
        let reconciler = Reconciler::new(store.clone());

        let mut w = workload("1", "w1");
        w.result = Some(UpdateResult::tag_only("1.2.4"));
        w.refresh_update_state();

        let first = reconciler.persist(w.clone()).await;
        assert!(first.changed);

        let second = reconciler.persist(w).await;
        assert!(!second.changed);
    }

    #[tokio::test]
    async fn test_new_result_with_update_is_reported() {
        let store = Arc::new(MemoryWorkloadStore::new());
        let reconciler = Reconciler::new(store.clone());

        let mut w = workload("1", "w1");
        w.result = Some(UpdateResult::tag_only("1.2.3"));
        w.refresh_update_state();
        reconciler.persist(w.clone()).await;

        w.result = Some(UpdateResult::tag_only("1.2.4"));
        w.refresh_update_state();
        let report = reconciler.persist(w).await;
        assert!(report.changed);
        assert!(report.workload.update_available);
    }
}
