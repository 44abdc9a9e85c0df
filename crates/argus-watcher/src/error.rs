//! Error types for the watcher engine.

use thiserror::Error;

use argus_core::{BackendError, StoreError};
use argus_registry::RegistryError;

/// Errors that can occur in watcher registration and watch cycles.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// Watcher configuration is invalid; the watcher is not started.
    #[error("Invalid configuration for watcher {watcher}: {message}")]
    InvalidConfiguration {
        /// Watcher name.
        watcher: String,
        /// Error message.
        message: String,
    },

    /// A cron expression could not be parsed.
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCron {
        /// The offending expression.
        expression: String,
        /// Error message.
        message: String,
    },

    /// The backend could not be reached during registration.
    #[error("Backend unreachable at {host}: {source}")]
    BackendUnreachable {
        /// Host address.
        host: String,
        /// Underlying error.
        #[source]
        source: BackendError,
    },

    /// Version finding was invoked against an unknown registry.
    #[error("Unsupported registry: {name}")]
    UnsupportedRegistry {
        /// Registry name recorded on the image.
        name: String,
    },

    /// A watcher with the same identity is already registered.
    #[error("Watcher already registered: {id}")]
    DuplicateWatcher {
        /// Component id.
        id: String,
    },

    /// No watcher is registered under the given identity.
    #[error("Unknown watcher: {id}")]
    UnknownWatcher {
        /// Component id.
        id: String,
    },

    /// A registry provider call failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
