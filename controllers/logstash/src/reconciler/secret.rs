//! Operator-managed credential Secret

use super::{Pass, Reconciler};
use crate::builders::build_secret;
use crate::credentials::preserve_or_generate;
use crate::error::ControllerError;
use crate::naming;
use cluster_store::ChildResource;
use tracing::{debug, info};

impl Reconciler {
    /// Applies `logstash-{name}-user` when a cluster is referenced
    ///
    /// Credentials already stored in the Secret are kept as they are.
    pub(crate) async fn reconcile_secret(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        let (namespace, name) = (pass.namespace()?, pass.name()?);
        info!("Reconciling secret for Logstash {}/{}", namespace, name);

        if pass.instance.spec.config.opensearch_cluster_ref.is_none() {
            debug!("No OpenSearch cluster referenced, skipping secret");
            return Ok(false);
        }

        let existing = match self.store.get_secret(namespace, &naming::secret_name(name)).await {
            Ok(secret) => Some(secret),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let credentials = preserve_or_generate(existing.as_ref(), self.credentials.as_ref(), &pass.instance);

        let secret = pass.owned(build_secret(&pass.instance, &credentials)?)?;
        let outcome = self.store.apply(ChildResource::Secret(secret)).await?;
        Ok(outcome.changed())
    }
}
