//! ClusterStore trait for mocking
//!
//! This trait abstracts the Kubernetes API server so reconcilers can be unit
//! tested against an in-memory store. The concrete `KubeClusterStore` implements
//! it on top of `kube::Api`.

use crate::error::StoreError;
use crds::Logstash;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};

/// A fully built child manifest handed to [`ClusterStore::apply`]
#[derive(Debug, Clone, PartialEq)]
pub enum ChildResource {
    /// Credential Secret
    Secret(Secret),
    /// Rendered pipeline ConfigMap
    ConfigMap(ConfigMap),
    /// Network Service
    Service(Service),
    /// Logstash Deployment
    Deployment(Deployment),
}

impl ChildResource {
    /// Kubernetes kind of the wrapped object
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Secret(_) => "Secret",
            Self::ConfigMap(_) => "ConfigMap",
            Self::Service(_) => "Service",
            Self::Deployment(_) => "Deployment",
        }
    }

    /// `metadata.name` of the wrapped object
    pub fn name(&self) -> Option<&str> {
        let meta = match self {
            Self::Secret(o) => &o.metadata,
            Self::ConfigMap(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
        };
        meta.name.as_deref()
    }
}

/// What [`ClusterStore::apply`] did to the live object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Object did not exist and was created
    Created,
    /// Object existed and was patched to match
    Patched,
    /// Object already matched the desired state
    Unchanged,
}

impl ApplyOutcome {
    /// Returns true when the live object was mutated
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Trait for cluster object store operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a Logstash resource by namespaced name
    async fn get_logstash(&self, namespace: &str, name: &str) -> Result<Logstash, StoreError>;

    /// Replace a Logstash resource (metadata/spec); fails with a conflict on a stale resourceVersion
    async fn update_logstash(&self, logstash: &Logstash) -> Result<Logstash, StoreError>;

    /// Write the status subresource; fails with a conflict on a stale resourceVersion
    async fn update_logstash_status(&self, logstash: &Logstash) -> Result<Logstash, StoreError>;

    /// Get a Secret by namespaced name
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError>;

    /// Get a Deployment by namespaced name
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, StoreError>;

    /// Create `desired` if absent, otherwise patch the live object to match it
    async fn apply(&self, desired: ChildResource) -> Result<ApplyOutcome, StoreError>;
}
