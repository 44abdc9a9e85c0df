//! Persistence collaborator trait and an in-memory implementation.
//!
//! The watcher engine only depends on this trait; production deployments plug
//! in a database-backed implementation, while tests and embedded setups use
//! [`MemoryWorkloadStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::backend::WorkloadStats;
use crate::error::StoreError;
use crate::workload::{Workload, WorkloadStatus};

/// Credentials stored for a registry provider instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Username or login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password or token secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Pre-issued token, when the provider uses one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Registry URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Persistence operations consumed by the watcher engine.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Finds a workload by its backend-assigned id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Workload>, StoreError>;

    /// Returns all workloads owned by a watcher.
    async fn find_all_by_watcher(&self, watcher: &str) -> Result<Vec<Workload>, StoreError>;

    /// Creates or updates a workload record.
    async fn upsert(&self, workload: &Workload) -> Result<(), StoreError>;

    /// Deletes a workload by id. Deleting an unknown id is not an error.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;

    /// Sets the status of every workload owned by a watcher.
    async fn update_status_by_watcher(
        &self,
        watcher: &str,
        status: WorkloadStatus,
    ) -> Result<(), StoreError>;

    /// Records a runtime stats sample for a workload.
    async fn record_stats(&self, workload_id: &str, stats: &WorkloadStats)
        -> Result<(), StoreError>;

    /// Looks up credentials stored for a registry provider instance.
    async fn find_registry_credentials(
        &self,
        provider: &str,
    ) -> Result<Option<RegistryCredentials>, StoreError>;
}

/// In-memory [`WorkloadStore`] for tests and embedded setups.
#[derive(Debug, Default)]
pub struct MemoryWorkloadStore {
    workloads: RwLock<HashMap<String, Workload>>,
    credentials: RwLock<HashMap<String, RegistryCredentials>>,
    stats: RwLock<HashMap<String, Vec<WorkloadStats>>>,
}

impl MemoryWorkloadStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds credentials for a provider instance.
    pub async fn put_registry_credentials(
        &self,
        provider: impl Into<String>,
        credentials: RegistryCredentials,
    ) {
        self.credentials
            .write()
            .await
            .insert(provider.into(), credentials);
    }

    /// Returns the recorded stats samples for a workload.
    pub async fn stats_for(&self, workload_id: &str) -> Vec<WorkloadStats> {
        self.stats
            .read()
            .await
            .get(workload_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkloadStore for MemoryWorkloadStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Workload>, StoreError> {
        Ok(self.workloads.read().await.get(id).cloned())
    }

    async fn find_all_by_watcher(&self, watcher: &str) -> Result<Vec<Workload>, StoreError> {
        Ok(self
            .workloads
            .read()
            .await
            .values()
            .filter(|w| w.watcher == watcher)
            .cloned()
            .collect())
    }

    async fn upsert(&self, workload: &Workload) -> Result<(), StoreError> {
        self.workloads
            .write()
            .await
            .insert(workload.id.clone(), workload.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.workloads.write().await.remove(id);
        Ok(())
    }

    async fn update_status_by_watcher(
        &self,
        watcher: &str,
        status: WorkloadStatus,
    ) -> Result<(), StoreError> {
        for workload in self.workloads.write().await.values_mut() {
            if workload.watcher == watcher {
                workload.status = status;
            }
        }
        Ok(())
    }

    async fn record_stats(
        &self,
        workload_id: &str,
        stats: &WorkloadStats,
    ) -> Result<(), StoreError> {
        self.stats
            .write()
            .await
            .entry(workload_id.to_string())
            .or_default()
            .push(stats.clone());
        Ok(())
    }

    async fn find_registry_credentials(
        &self,
        provider: &str,
    ) -> Result<Option<RegistryCredentials>, StoreError> {
        Ok(self.credentials.read().await.get(provider).cloned())
    }
}
