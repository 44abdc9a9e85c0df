//! # Argus Registry
//!
//! Registry provider layer for the Argus container update watcher.
//!
//! Each supported registry vendor implements the [`RegistryProvider`]
//! contract: recognize an image reference, normalize it to the vendor's
//! canonical API root, authenticate with the vendor's protocol, list tags
//! and resolve manifest digests. The [`RegistryDirectory`] holds the
//! configured instances and selects the first provider whose matching rule
//! recognizes an image.
//!
//! ## Supported vendors
//!
//! Docker Hub, self-hosted Distribution-API registries, AWS ECR, Google GCR,
//! GitHub GHCR, Azure ACR, Quay.io, GitLab, Gitea, Forgejo and
//! linuxserver.io.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use argus_registry::providers::ghcr::{GhcrConfig, GhcrProvider};
//! use argus_registry::RegistryDirectory;
//!
//! # fn main() -> Result<(), argus_registry::RegistryError> {
//! let mut directory = RegistryDirectory::with_default_hub()?;
//! directory.register(Arc::new(GhcrProvider::new("ghcr", GhcrConfig::default())?))?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod manifest;
pub mod providers;

mod directory;
mod error;
mod provider;

pub use directory::RegistryDirectory;
pub use error::RegistryError;
pub use manifest::ManifestDigest;
pub use provider::{
    build_http_client, registry_host, HttpMethod, ProviderKind, RegistryProvider, RequestOptions,
};
