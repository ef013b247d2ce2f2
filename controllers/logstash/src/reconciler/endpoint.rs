//! OpenSearch endpoint resolution
//!
//! Computes the in-cluster URL of the referenced cluster and checks that the
//! credential Secret exists. The result lives in the [`Pass`] only.

use super::{Pass, Reconciler};
use crate::builders::ResolvedEndpoint;
use crate::error::ControllerError;
use tracing::{debug, info};

/// In-cluster HTTPS URL of an OpenSearch service
pub fn cluster_url(service: &str, namespace: &str) -> String {
    format!("https://{service}.{namespace}.svc.cluster.local:9200")
}

impl Reconciler {
    pub(crate) async fn resolve_endpoint(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        let (namespace, name) = (pass.namespace()?, pass.name()?);
        info!("Resolving OpenSearch endpoint for Logstash {}/{}", namespace, name);

        let Some(cluster) = pass.instance.spec.config.opensearch_cluster_ref.as_ref() else {
            debug!("No OpenSearch cluster referenced");
            return Ok(false);
        };

        let service = cluster.service().ok_or_else(|| {
            ControllerError::InvalidSpec(format!(
                "Logstash {namespace}/{name}: opensearchClusterRef.serviceName is required to build the cluster URL"
            ))
        })?;
        let url = cluster_url(service, cluster.namespace_or(namespace));

        let secret_name = cluster.credential_secret().ok_or_else(|| {
            ControllerError::InvalidSpec(format!(
                "Logstash {namespace}/{name}: opensearchClusterRef.credentialSecretName is required to log in to the cluster"
            ))
        })?;
        // Pods can only reference Secrets in their own namespace
        let secret = self.store.get_secret(namespace, secret_name).await?;
        let credential_secret = secret
            .metadata
            .name
            .unwrap_or_else(|| secret_name.to_string());

        debug!("Logstash {}/{} ships to {}", namespace, name, url);
        pass.endpoint = Some(ResolvedEndpoint { url, credential_secret });
        Ok(false)
    }
}
