//! Cluster store errors

use thiserror::Error;

/// Errors that can occur when reading or writing cluster objects
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error not covered by a more specific variant
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency conflict (stale resourceVersion)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing data the store needs (name, namespace, ...)
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl StoreError {
    /// Returns true when the object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Kube(kube::Error::Api(api_err)) => api_err.code == 404,
            _ => false,
        }
    }

    /// Returns true when a write lost an optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Kube(kube::Error::Api(api_err)) => api_err.code == 409,
            _ => false,
        }
    }

    /// Maps a raw kube error for `what`, lifting 404 and 409 into typed variants
    pub fn from_kube(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                Self::NotFound(format!("{what}: {}", api_err.message))
            }
            kube::Error::Api(api_err) if api_err.code == 409 => {
                Self::Conflict(format!("{what}: {}", api_err.message))
            }
            other => Self::Kube(other),
        }
    }
}
