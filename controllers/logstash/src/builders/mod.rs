//! Desired-state builders
//!
//! Pure functions from a Logstash resource (plus the endpoint resolved earlier in
//! the same pass) to complete child manifests. Builders never set owner
//! references; the sub-reconcilers do that before applying.

pub mod configmap;
pub mod deployment;
pub mod secret;
pub mod service;

pub use configmap::build_config_map;
pub use deployment::build_deployment;
pub use secret::build_secret;
pub use service::build_service;

use crate::naming;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// OpenSearch endpoint resolved for the current reconcile pass
///
/// Never persisted; rebuilt on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// In-cluster HTTPS URL of the cluster service
    pub url: String,
    /// Secret holding `username` and `password` for the cluster
    pub credential_secret: String,
}

fn child_meta(logstash_name: &str, namespace: &str, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(naming::labels(logstash_name)),
        ..Default::default()
    }
}
