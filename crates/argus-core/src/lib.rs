//! # Argus Core
//!
//! Core domain types and pure update-classification logic for the Argus
//! container update watcher.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - The [`Workload`] data model (a running container or VM tracked by a
//!   watcher) together with its image, digest and update-result metadata.
//! - The tag engine ([`tag`]): semantic-version parsing with loose coercion,
//!   ordering, severity diffing, and regex-formula tag rewriting.
//! - Tag candidate selection ([`candidates`]) and update classification
//!   ([`Workload::compute_update_available`], [`Workload::compute_update_kind`]).
//! - The external collaborator traits: [`WorkloadStore`] (persistence) and
//!   [`ContainerBackend`] (host container/hypervisor API).
//!
//! ## Quick Start
//!
//! ```rust
//! use argus_core::tag;
//!
//! // Strict parse with loose coercion fallback
//! let version = tag::parse_semver("v1.2.3-alpine").unwrap();
//! assert_eq!(version.major, 1);
//!
//! // Rewrite a tag with a `<regex> => <replacement>` formula
//! let rewritten = tag::transform_tag(Some("^win-(\\d+\\.\\d+\\.\\d+)$ => $1"), "win-1.2.3");
//! assert_eq!(rewritten, "1.2.3");
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod candidates;
pub mod label;
pub mod link;
pub mod store;
pub mod tag;

mod error;
mod image_ref;
mod update;
mod workload;


pub use backend::{
    BackendEvent, BackendEventKind, ContainerBackend, DiscoveredWorkload, ImageInspect,
    WorkloadStats,
};
pub use candidates::tag_candidates;
pub use error::{BackendError, StoreError};
pub use image_ref::{ImageRef, ImageRefError};
pub use store::{MemoryWorkloadStore, RegistryCredentials, WorkloadStore};
pub use update::is_digest_to_watch;
pub use workload::{
    Image, ImageDigest, ImageRegistry, ImageTag, SemverDiff, UpdateCategory, UpdateKind,
    UpdateResult, Workload, WorkloadError, WorkloadStatus,
};
