//! Error types for the store and backend collaborator traits.

use thiserror::Error;

/// Errors that can occur in the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Workload not found.
    #[error("Workload not found: {id}")]
    NotFound {
        /// Workload id.
        id: String,
    },

    /// The store is unavailable.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// A record could not be serialized or deserialized.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Error message.
        message: String,
    },
}

/// Errors that can occur when talking to a host's container/hypervisor API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The host could not be reached.
    #[error("Backend unreachable at {host}: {message}")]
    Unreachable {
        /// Host address.
        host: String,
        /// Error message.
        message: String,
    },

    /// A referenced workload or image does not exist on the host.
    #[error("Not found on backend: {reference}")]
    NotFound {
        /// Workload id or image reference.
        reference: String,
    },

    /// The backend API returned an error.
    #[error("Backend API error: {message}")]
    Api {
        /// Error message.
        message: String,
    },

    /// The live event stream failed.
    #[error("Backend event stream error: {message}")]
    EventStream {
        /// Error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            id: "abc123".to_string(),
        };
        assert_eq!(err.to_string(), "Workload not found: abc123");
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Unreachable {
            host: "10.0.0.5".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Backend unreachable at 10.0.0.5: connection refused"
        );
    }
}
