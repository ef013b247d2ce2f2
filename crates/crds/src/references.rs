//! Object references used by the Logstash CRD
//!
//! Follows the Kubernetes `LocalObjectReference` pattern: a name that resolves in
//! the namespace of the referencing resource unless a namespace is given.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to an object in the same namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectRef {
    /// Name of the referenced object
    pub name: String,
}

/// Reference to the OpenSearch cluster Logstash ships events to
///
/// The operator derives the in-cluster URL from `serviceName` and `namespace`
/// and reads the login for the generated output stanza from
/// `credentialSecretName`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OpenSearchClusterRef {
    /// Name of the OpenSearch cluster
    pub name: String,

    /// Namespace of the cluster service (defaults to the Logstash namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Service fronting the cluster's HTTP port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Secret holding `username` and `password` for the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_secret_name: Option<String>,
}

impl OpenSearchClusterRef {
    /// Service name, if set and non-empty
    pub fn service(&self) -> Option<&str> {
        self.service_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Credential secret name, if set and non-empty
    pub fn credential_secret(&self) -> Option<&str> {
        self.credential_secret_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Namespace of the service, falling back to `default_namespace`
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace)
    }
}
