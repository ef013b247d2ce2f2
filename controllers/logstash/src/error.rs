//! Controller-specific error types.
//!
//! This module defines error types specific to the Logstash controller
//! that are not covered by upstream library errors.

use cluster_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Logstash controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster store error (get, update or apply)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The Logstash spec cannot be turned into child resources
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object is missing name, namespace or uid
    #[error("Object is missing {0}")]
    MissingObjectKey(&'static str),

    /// Optimistic-concurrency retries ran out
    #[error("{operation} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted {
        /// What was being written
        operation: String,
        /// How many attempts were made
        attempts: u32,
    },

    /// The Logstash resource disappeared during a pass
    #[error("Logstash {namespace}/{name} was deleted during reconciliation")]
    ParentDeleted {
        /// Namespace of the parent
        namespace: String,
        /// Name of the parent
        name: String,
    },

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// True when the parent resource no longer exists
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ParentDeleted { .. } => true,
            Self::Store(e) => e.is_not_found(),
            Self::Kube(KubeError::Api(api_err)) => api_err.code == 404,
            _ => false,
        }
    }

    /// True when a write lost an optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) => e.is_conflict(),
            Self::Kube(KubeError::Api(api_err)) => api_err.code == 409,
            _ => false,
        }
    }
}
