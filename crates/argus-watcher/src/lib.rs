//! # Argus Watcher
//!
//! Watcher engine for the Argus container update watcher: per-host
//! scheduling, workload discovery and enrichment, update detection and
//! reconciliation.
//!
//! A [`Watcher`] owns one managed host's backend connection and its timers:
//! a primary cron schedule for full watch cycles, an optional stats
//! schedule, and a debounced listener over the backend's live event stream.
//! The [`WatcherEngine`] manages all watcher lifecycles and shares one
//! read-only registry provider directory across them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use argus_core::MemoryWorkloadStore;
//! use argus_registry::RegistryDirectory;
//! use argus_watcher::{BackendKind, WatcherConfig, WatcherEngine};
//!
//! # async fn example(backend: Arc<dyn argus_core::ContainerBackend>) -> Result<(), argus_watcher::WatcherError> {
//! let store = Arc::new(MemoryWorkloadStore::new());
//! let directory = Arc::new(RegistryDirectory::with_default_hub()?);
//! let engine = WatcherEngine::new(store, directory);
//!
//! let id = engine
//!     .register_watcher(
//!         BackendKind::Docker,
//!         "host1",
//!         WatcherConfig::for_host("10.0.0.5"),
//!         backend,
//!     )
//!     .await?;
//! engine.trigger_immediate_watch(&id).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod debounce;
mod engine;
mod error;
mod reconcile;
mod watcher;

pub use config::{Schedules, WatcherConfig, DEFAULT_CRON, DEFAULT_STATS_CRON};
pub use debounce::Debouncer;
pub use engine::{BackendKind, ComponentId, ComponentKind, WatcherEngine};
pub use error::WatcherError;
pub use reconcile::{Reconciler, WorkloadReport};
pub use watcher::{CycleSummary, Watcher};
