//! Runtime directory of configured registry providers.
//!
//! Providers are kept in registration order and matched first-wins, so the
//! selection is deterministic. The directory is built once at startup and
//! injected into every watcher; after that it is read-only.

use std::sync::Arc;

use argus_core::{ImageRegistry, Workload};

use crate::error::RegistryError;
use crate::provider::RegistryProvider;
use crate::providers::hub::{HubConfig, HubProvider};

/// Ordered lookup table of registry provider instances.
#[derive(Default)]
pub struct RegistryDirectory {
    providers: Vec<Arc<dyn RegistryProvider>>,
}

impl RegistryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with an anonymous Docker Hub
    /// provider, the one registry every deployment can reach.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be constructed.
    pub fn with_default_hub() -> Result<Self, RegistryError> {
        let mut directory = Self::new();
        directory.register(Arc::new(HubProvider::new("hub", HubConfig::default())?))?;
        Ok(directory)
    }

    /// Registers a provider at the end of the match order.
    ///
    /// # Errors
    ///
    /// Returns an error when a provider with the same label is already
    /// registered.
    pub fn register(&mut self, provider: Arc<dyn RegistryProvider>) -> Result<(), RegistryError> {
        let label = provider.label();
        if self.providers.iter().any(|p| p.label() == label) {
            return Err(RegistryError::DuplicateProvider { label });
        }
        tracing::info!(provider = %label, "Registering registry provider");
        self.providers.push(provider);
        Ok(())
    }

    /// Returns the registered providers in match order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn RegistryProvider>] {
        &self.providers
    }

    /// Looks a provider up by its label.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn RegistryProvider>> {
        self.providers.iter().find(|p| p.label() == name).cloned()
    }

    /// Returns the first provider whose matching rule recognizes the image.
    #[must_use]
    pub fn resolve(&self, workload: &Workload) -> Option<Arc<dyn RegistryProvider>> {
        self.providers
            .iter()
            .find(|p| p.matches(&workload.image))
            .cloned()
    }

    /// Normalizes a workload's image against the matching provider.
    ///
    /// When no provider matches, the registry name is set to `unknown` and
    /// the workload proceeds without remote queries.
    pub fn normalize_workload(&self, workload: &mut Workload) {
        match self.resolve(workload) {
            Some(provider) => {
                tracing::debug!(
                    workload = %workload.full_name(),
                    provider = %provider.label(),
                    "Registry provider resolved"
                );
                workload.image = provider.normalize_image(workload.image.clone());
            }
            None => {
                tracing::warn!(
                    workload = %workload.full_name(),
                    registry = %workload.image.registry.url,
                    "No registry provider found"
                );
                workload.image.registry.name = ImageRegistry::UNKNOWN.to_string();
            }
        }
    }
}

impl std::fmt::Debug for RegistryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryDirectory")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.label()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
