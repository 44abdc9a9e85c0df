//! Watcher engine: lifecycle registry of all watchers.
//!
//! The engine instantiates watchers from configuration, keyed by a
//! composite identifier, and exposes manual refresh to the API layer. The
//! registry provider directory is constructed once at process start and
//! injected here, then shared read-only with every watcher.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use argus_core::{ContainerBackend, WorkloadStore};
use argus_registry::RegistryDirectory;

use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::watcher::{CycleSummary, Watcher};

/// Kind of a managed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A per-host watcher.
    Watcher,
    /// A registry provider.
    Registry,
}

impl ComponentKind {
    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Watcher => "watcher",
            Self::Registry => "registry",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend flavor a watcher speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Container engine backend.
    Docker,
    /// Hypervisor container backend.
    Proxmox,
}

impl BackendKind {
    /// Returns the lowercase backend name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Proxmox => "proxmox",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite identifier of a managed component (`kind.provider.name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId {
    /// Component kind.
    pub kind: ComponentKind,

    /// Provider (backend kind for watchers, vendor for registries).
    pub provider: String,

    /// Instance name.
    pub name: String,
}

impl ComponentId {
    /// Builds a watcher component id.
    #[must_use]
    pub fn watcher(backend: BackendKind, name: &str) -> Self {
        Self {
            kind: ComponentKind::Watcher,
            provider: backend.as_str().to_string(),
            name: name.to_lowercase(),
        }
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.kind, self.provider, self.name)
    }
}

/// Owns the lifecycle of every watcher across all managed hosts.
pub struct WatcherEngine {
    store: Arc<dyn WorkloadStore>,
    directory: Arc<RegistryDirectory>,
    watchers: RwLock<HashMap<String, Arc<Watcher>>>,
}

impl WatcherEngine {
    /// Creates an engine over a store and a provider directory.
    #[must_use]
    pub fn new(store: Arc<dyn WorkloadStore>, directory: Arc<RegistryDirectory>) -> Self {
        Self {
            store,
            directory,
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the shared registry provider directory.
    #[must_use]
    pub fn directory(&self) -> Arc<RegistryDirectory> {
        Arc::clone(&self.directory)
    }

    /// Registers and starts a watcher for one managed host.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity is taken, the configuration is
    /// invalid or the backend cannot be reached; a failed watcher is not
    /// registered.
    pub async fn register_watcher(
        &self,
        backend_kind: BackendKind,
        name: &str,
        config: WatcherConfig,
        backend: Arc<dyn ContainerBackend>,
    ) -> Result<ComponentId, WatcherError> {
        let id = ComponentId::watcher(backend_kind, name);
        let key = id.to_string();
        if self.watchers.read().await.contains_key(&key) {
            return Err(WatcherError::DuplicateWatcher { id: key });
        }
        tracing::info!(id = %key, host = %config.host, "Registering watcher");

        let watcher_name = format!("{backend_kind}-{}", id.name);
        let watcher = Watcher::new(
            watcher_name,
            config,
            backend,
            Arc::clone(&self.store),
            Arc::clone(&self.directory),
        )?;
        watcher.init().await?;

        self.watchers.write().await.insert(key, watcher);
        Ok(id)
    }

    /// Returns a registered watcher.
    pub async fn watcher(&self, id: &ComponentId) -> Option<Arc<Watcher>> {
        self.watchers.read().await.get(&id.to_string()).cloned()
    }

    /// Returns the ids of all registered watchers.
    pub async fn watcher_ids(&self) -> Vec<String> {
        self.watchers.read().await.keys().cloned().collect()
    }

    /// Runs a watch cycle immediately (manual refresh).
    ///
    /// # Errors
    ///
    /// Returns an error when no watcher is registered under the id.
    pub async fn trigger_immediate_watch(
        &self,
        id: &ComponentId,
    ) -> Result<CycleSummary, WatcherError> {
        let watcher = self
            .watcher(id)
            .await
            .ok_or_else(|| WatcherError::UnknownWatcher { id: id.to_string() })?;
        tracing::info!(id = %id, "Manual watch triggered");
        Ok(watcher.watch_cycle().await)
    }

    /// Stops and removes a watcher. Idempotent.
    pub async fn deregister_watcher(&self, id: &ComponentId) {
        if let Some(watcher) = self.watchers.write().await.remove(&id.to_string()) {
            watcher.deregister().await;
        }
    }

    /// Stops and removes every watcher.
    pub async fn deregister_all(&self) {
        tracing::warn!("Deregistering all watchers");
        let watchers: Vec<Arc<Watcher>> = self.watchers.write().await.drain().map(|(_, w)| w).collect();
        for watcher in watchers {
            watcher.deregister().await;
        }
    }
}

impl std::fmt::Debug for WatcherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherEngine").finish_non_exhaustive()
    }
}
