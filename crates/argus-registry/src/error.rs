//! Error types for registry provider operations.

use thiserror::Error;

/// Errors that can occur when querying a remote image registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to the registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication failed.
    #[error("Authentication failed for {provider}: {message}")]
    AuthenticationFailed {
        /// Provider label.
        provider: String,
        /// Error message.
        message: String,
    },

    /// The authentication challenge could not be parsed.
    #[error("Unparseable authentication challenge: {message}")]
    InvalidChallenge {
        /// Error message.
        message: String,
    },

    /// HTTP error from the registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// No manifest could be resolved for an image.
    #[error("No manifest found for image {image}")]
    ManifestNotFound {
        /// Image repository path.
        image: String,
    },

    /// Provider configuration is invalid; the provider is not registered.
    #[error("Invalid configuration for {provider}: {message}")]
    InvalidConfiguration {
        /// Provider label.
        provider: String,
        /// Error message.
        message: String,
    },

    /// A provider instance with the same identity is already registered.
    #[error("Provider already registered: {label}")]
    DuplicateProvider {
        /// Provider label.
        label: String,
    },

    /// A cloud credential provider rejected the request.
    #[error("Credential provider error: {message}")]
    CredentialProvider {
        /// Error message.
        message: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::HttpError {
                status,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}
