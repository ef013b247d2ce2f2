//! Network Service

use super::{Pass, Reconciler};
use crate::builders::build_service;
use crate::error::ControllerError;
use cluster_store::ChildResource;
use tracing::info;

impl Reconciler {
    /// Applies `logstash-{name}-network`; a spec without ports is an error
    pub(crate) async fn reconcile_service(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        info!("Reconciling service for Logstash {}/{}", pass.namespace()?, pass.name()?);

        let service = pass.owned(build_service(&pass.instance)?)?;
        let outcome = self.store.apply(ChildResource::Service(service)).await?;
        Ok(outcome.changed())
    }
}
