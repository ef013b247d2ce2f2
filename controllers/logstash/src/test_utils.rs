//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::builders::ResolvedEndpoint;
use crate::credentials::{CredentialSource, Credentials, PASSWORD_KEY, USERNAME_KEY};
use crate::reconciler::Reconciler;
use crate::retry::RetryPolicy;
use cluster_store::MockClusterStore;
use crds::{Logstash, LogstashSpec, OpenSearchClusterRef};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::time::Duration;

/// Name of the user-provided cluster credential Secret in fixtures
pub const TEST_CREDENTIAL_SECRET: &str = "admin-credentials";

/// Helper to create a test Logstash with one port and no cluster reference
pub fn create_test_logstash(name: &str, namespace: &str) -> Logstash {
    let mut logstash = Logstash::new(name, LogstashSpec::default());
    logstash.metadata.namespace = Some(namespace.to_string());
    logstash.spec.replicas = 1;
    logstash.spec.config.ports = vec![8080];
    logstash
}

/// Adds an OpenSearch cluster reference to `logstash`
pub fn with_cluster_ref(mut logstash: Logstash) -> Logstash {
    logstash.spec.config.opensearch_cluster_ref = Some(OpenSearchClusterRef {
        name: "my-cluster".to_string(),
        namespace: None,
        service_name: Some("my-cluster".to_string()),
        credential_secret_name: Some(TEST_CREDENTIAL_SECRET.to_string()),
    });
    logstash
}

/// Endpoint matching [`with_cluster_ref`] in namespace `default`
pub fn test_endpoint() -> ResolvedEndpoint {
    ResolvedEndpoint {
        url: "https://my-cluster.default.svc.cluster.local:9200".to_string(),
        credential_secret: TEST_CREDENTIAL_SECRET.to_string(),
    }
}

/// Helper to create a Secret with `username` and `password`
pub fn create_test_credential_secret(name: &str, namespace: &str, username: &str, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), ByteString(username.as_bytes().to_vec())),
            (PASSWORD_KEY.to_string(), ByteString(password.as_bytes().to_vec())),
        ])),
        ..Default::default()
    }
}

/// Deterministic credentials for assertions
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCredentials;

impl CredentialSource for FixedCredentials {
    fn generate(&self, _instance: &Logstash) -> Credentials {
        Credentials {
            username: "logstash".to_string(),
            password: "generated".to_string(),
        }
    }
}

/// Helper to create a reconciler over `store` with fixed credentials and instant retries
pub fn create_test_reconciler(store: MockClusterStore) -> Reconciler {
    Reconciler::new(store)
        .with_credentials(FixedCredentials)
        .with_retry_policy(RetryPolicy {
            attempts: 5,
            delay: Duration::ZERO,
        })
}
