//! Phase derivation
//!
//! `RUNNING` once every declared replica of the Deployment is ready, `PENDING`
//! otherwise. The status is only written when the phase changes, which is also
//! when `lastTransitionTime` moves.

use super::{Pass, Reconciler, parent_error};
use crate::error::ControllerError;
use crate::naming;
use crate::retry::retry_on_conflict;
use crds::{LogstashPhase, LogstashStatus};
use k8s_openapi::api::apps::v1::Deployment;
use tracing::{debug, info};

/// Phase implied by a Deployment's readiness
pub fn derive_phase(deployment: &Deployment) -> LogstashPhase {
    let declared = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);
    if ready == declared {
        LogstashPhase::Running
    } else {
        LogstashPhase::Pending
    }
}

impl Reconciler {
    pub(crate) async fn reconcile_status(&self, pass: &mut Pass) -> Result<bool, ControllerError> {
        let (namespace, name) = (pass.namespace()?, pass.name()?);
        info!("Reconciling status for Logstash {}/{}", namespace, name);

        let deployment_name = naming::deployment_name(name);
        let deployment_name = deployment_name.as_str();
        // Every attempt re-reads both the Deployment and the parent
        let (updated, transition) = retry_on_conflict(self.retry, "status update", || async move {
            let deployment = self.store.get_deployment(namespace, deployment_name).await?;
            let phase = derive_phase(&deployment);

            let mut instance = self.fetch_parent(namespace, name).await?;
            let current = instance.status.as_ref().and_then(|s| s.phase);
            if current == Some(phase) {
                return Ok((instance, None));
            }
            instance.status = Some(LogstashStatus {
                phase: Some(phase),
                last_transition_time: Some(chrono::Utc::now()),
            });
            let updated = self
                .store
                .update_logstash_status(&instance)
                .await
                .map_err(|e| parent_error(e, namespace, name))?;
            Ok((updated, Some((current, phase))))
        })
        .await?;

        let changed = match transition {
            Some((current, phase)) => {
                info!(
                    "Logstash {}/{} phase {} -> {}",
                    namespace,
                    name,
                    current.map_or_else(|| "<none>".to_string(), |p| p.to_string()),
                    phase
                );
                true
            }
            None => {
                debug!("Logstash {}/{} phase unchanged", namespace, name);
                false
            }
        };
        pass.instance = updated;
        Ok(changed)
    }
}
