//! Pipeline ConfigMap

use super::{Pass, Reconciler};
use crate::builders::build_config_map;
use crate::error::ControllerError;
use cluster_store::ChildResource;
use tracing::{debug, info};

impl Reconciler {
    /// Applies `logstash-{name}-pipelines` and records the content hash in the pass
    pub(crate) async fn reconcile_config_map(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        info!("Reconciling configmap for Logstash {}/{}", pass.namespace()?, pass.name()?);

        let (config_map, hash) = build_config_map(&pass.instance, pass.endpoint.as_ref())?;
        let config_map = pass.owned(config_map)?;
        let outcome = self.store.apply(ChildResource::ConfigMap(config_map)).await?;

        debug!("Pipeline hash {}", hash);
        pass.config_hash = Some(hash);
        Ok(outcome.changed())
    }
}
