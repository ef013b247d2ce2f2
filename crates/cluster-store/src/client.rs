//! `kube`-backed ClusterStore implementation
//!
//! Reads go straight to the API server. `apply` performs get-or-create-or-patch,
//! always through server-side apply under one field manager: absent objects are
//! applied (created) outright, existing ones only when the live object does not
//! already contain the desired fields.

use crate::diff;
use crate::error::StoreError;
use crate::store_trait::{ApplyOutcome, ChildResource, ClusterStore};
use crds::Logstash;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info};

/// Cluster store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    /// Create a store using `field_manager` for server-side apply
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn apply_typed<K>(&self, desired: &K) -> Result<ApplyOutcome, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        let kind = K::kind(&());
        let meta = desired.meta();
        let name = meta
            .name
            .as_deref()
            .ok_or_else(|| StoreError::InvalidObject(format!("{kind} missing name")))?;
        let namespace = meta
            .namespace
            .as_deref()
            .ok_or_else(|| StoreError::InvalidObject(format!("{kind} {name} missing namespace")))?;
        let what = format!("{kind} {namespace}/{name}");
        let api: Api<K> = self.api(namespace);

        let live = match api.get_opt(name).await {
            Ok(live) => live,
            Err(e) => return Err(StoreError::from_kube(e, &what)),
        };

        let desired_value = serde_json::to_value(desired)?;
        let outcome = match live {
            None => ApplyOutcome::Created,
            Some(live) => {
                let live_value = serde_json::to_value(&live)?;
                if !diff::needs_update(&desired_value, &live_value) {
                    debug!("{} already up-to-date", what);
                    return Ok(ApplyOutcome::Unchanged);
                }
                ApplyOutcome::Patched
            }
        };

        // Create through apply as well: pruning only covers fields our manager owns
        let pp = PatchParams::apply(&self.field_manager).force();
        let desired_value = diff::strip_server_fields(desired_value);
        api.patch(name, &pp, &Patch::Apply(&desired_value))
            .await
            .map_err(|e| StoreError::from_kube(e, &what))?;
        info!("{:?} {}", outcome, what);
        Ok(outcome)
    }
}

fn logstash_key(logstash: &Logstash) -> Result<(&str, &str), StoreError> {
    let name = logstash
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::InvalidObject("Logstash missing name".to_string()))?;
    let namespace = logstash
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| StoreError::InvalidObject(format!("Logstash {name} missing namespace")))?;
    Ok((namespace, name))
}

#[async_trait::async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_logstash(&self, namespace: &str, name: &str) -> Result<Logstash, StoreError> {
        self.api::<Logstash>(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("Logstash {namespace}/{name}")))
    }

    async fn update_logstash(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
        let (namespace, name) = logstash_key(logstash)?;
        self.api::<Logstash>(namespace)
            .replace(name, &PostParams::default(), logstash)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("Logstash {namespace}/{name}")))
    }

    async fn update_logstash_status(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
        let (namespace, name) = logstash_key(logstash)?;
        // resourceVersion in a merge patch makes the write conditional
        let status_patch = serde_json::json!({
            "metadata": { "resourceVersion": logstash.metadata.resource_version },
            "status": logstash.status,
        });
        self.api::<Logstash>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("Logstash {namespace}/{name} status")))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.api::<Secret>(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("Secret {namespace}/{name}")))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, StoreError> {
        self.api::<Deployment>(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("Deployment {namespace}/{name}")))
    }

    async fn apply(&self, desired: ChildResource) -> Result<ApplyOutcome, StoreError> {
        match desired {
            ChildResource::Secret(secret) => self.apply_typed::<Secret>(&secret).await,
            ChildResource::ConfigMap(cm) => self.apply_typed::<ConfigMap>(&cm).await,
            ChildResource::Service(svc) => self.apply_typed::<Service>(&svc).await,
            ChildResource::Deployment(deploy) => self.apply_typed::<Deployment>(&deploy).await,
        }
    }
}
