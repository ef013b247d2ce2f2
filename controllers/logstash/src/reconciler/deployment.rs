//! Logstash Deployment

use super::{Pass, Reconciler};
use crate::builders::build_deployment;
use crate::error::ControllerError;
use cluster_store::ChildResource;
use tracing::info;

impl Reconciler {
    /// Applies `logstash-{name}-deployment` using the endpoint and hash from this pass
    pub(crate) async fn reconcile_deployment(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        info!("Reconciling deployment for Logstash {}/{}", pass.namespace()?, pass.name()?);

        let hash = pass.config_hash.as_deref().ok_or_else(|| {
            ControllerError::Reconciliation("pipeline hash missing, configmap step did not run".to_string())
        })?;
        let deployment = build_deployment(&pass.instance, pass.endpoint.as_ref(), hash)?;
        let deployment = pass.owned(deployment)?;
        let outcome = self.store.apply(ChildResource::Deployment(deployment)).await?;
        Ok(outcome.changed())
    }
}
