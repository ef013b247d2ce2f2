//! Mock ClusterStore for unit testing
//!
//! Objects live in memory, keyed by `(namespace, name)`. Writes to the parent
//! resource check `resourceVersion` like the API server does, and conflicts can
//! be injected to exercise retry paths.

use crate::diff;
use crate::error::StoreError;
use crate::store_trait::{ApplyOutcome, ChildResource, ClusterStore};
use crds::Logstash;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::Resource;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record of one `apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    /// Child kind, e.g. `Deployment`
    pub kind: &'static str,
    /// `metadata.name` of the applied object
    pub name: String,
    /// What the apply did
    pub outcome: ApplyOutcome,
}

/// Mock ClusterStore for testing
#[derive(Clone, Default)]
pub struct MockClusterStore {
    logstashes: Arc<Mutex<HashMap<Key, Logstash>>>,
    secrets: Arc<Mutex<HashMap<Key, Secret>>>,
    config_maps: Arc<Mutex<HashMap<Key, ConfigMap>>>,
    services: Arc<Mutex<HashMap<Key, Service>>>,
    deployments: Arc<Mutex<HashMap<Key, Deployment>>>,
    applied: Arc<Mutex<Vec<AppliedRecord>>>,
    // Number of upcoming parent writes that fail with a conflict
    pending_conflicts: Arc<Mutex<u32>>,
    // Source of resourceVersion values
    next_version: Arc<Mutex<u64>>,
}

impl MockClusterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        let mut version = lock(&self.next_version);
        *version += 1;
        version.to_string()
    }

    fn take_conflict(&self) -> bool {
        let mut pending = lock(&self.pending_conflicts);
        if *pending > 0 {
            *pending -= 1;
            true
        } else {
            false
        }
    }

    /// Store a Logstash resource (for test setup), assigning uid and resourceVersion
    pub fn insert_logstash(&self, mut logstash: Logstash) -> Logstash {
        let namespace = logstash.metadata.namespace.clone().unwrap_or_default();
        let name = logstash.metadata.name.clone().unwrap_or_default();
        if logstash.metadata.uid.is_none() {
            logstash.metadata.uid = Some(format!("uid-{namespace}-{name}"));
        }
        logstash.metadata.resource_version = Some(self.bump_version());
        lock(&self.logstashes).insert(key(&namespace, &name), logstash.clone());
        logstash
    }

    /// Current stored Logstash, if any
    pub fn logstash(&self, namespace: &str, name: &str) -> Option<Logstash> {
        lock(&self.logstashes).get(&key(namespace, name)).cloned()
    }

    /// Simulate a user delete: set `deletionTimestamp`, remove right away if no finalizers remain
    pub fn mark_logstash_deleted(&self, namespace: &str, name: &str) {
        let mut logstashes = lock(&self.logstashes);
        let Some(logstash) = logstashes.get_mut(&key(namespace, name)) else {
            return;
        };
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        logstash.metadata.deletion_timestamp = serde_json::from_value(serde_json::json!(now)).ok();
        let finalizers_empty = logstash
            .metadata
            .finalizers
            .as_ref()
            .is_none_or(|f| f.is_empty());
        if finalizers_empty {
            logstashes.remove(&key(namespace, name));
        }
    }

    /// Store a Secret (for test setup, e.g. user-provided cluster credentials)
    pub fn insert_secret(&self, secret: Secret) {
        let namespace = secret.metadata.namespace.clone().unwrap_or_default();
        let name = secret.metadata.name.clone().unwrap_or_default();
        lock(&self.secrets).insert(key(&namespace, &name), secret);
    }

    /// Current stored Secret, if any
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        lock(&self.secrets).get(&key(namespace, name)).cloned()
    }

    /// Current stored ConfigMap, if any
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        lock(&self.config_maps).get(&key(namespace, name)).cloned()
    }

    /// Current stored Service, if any
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        lock(&self.services).get(&key(namespace, name)).cloned()
    }

    /// Current stored Deployment, if any
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        lock(&self.deployments).get(&key(namespace, name)).cloned()
    }

    /// Overwrite the Deployment's ready replica count (simulates pods becoming ready)
    pub fn set_deployment_ready_replicas(&self, namespace: &str, name: &str, ready: i32) {
        if let Some(deploy) = lock(&self.deployments).get_mut(&key(namespace, name)) {
            let status = deploy.status.get_or_insert_with(DeploymentStatus::default);
            status.ready_replicas = Some(ready);
        }
    }

    /// Make the next `count` Logstash writes fail with a conflict
    pub fn inject_conflicts(&self, count: u32) {
        *lock(&self.pending_conflicts) = count;
    }

    /// Every `apply` call seen so far, in order
    pub fn applied(&self) -> Vec<AppliedRecord> {
        lock(&self.applied).clone()
    }

    /// Forget recorded `apply` calls
    pub fn clear_applied(&self) {
        lock(&self.applied).clear();
    }

    fn apply_into<K>(
        &self,
        objects: &Mutex<HashMap<Key, K>>,
        mut desired: K,
        keep_live: impl FnOnce(&K, &mut K),
    ) -> Result<ApplyOutcome, StoreError>
    where
        K: Resource + Serialize + Clone,
    {
        let meta = desired.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| StoreError::InvalidObject("object missing name".to_string()))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or_else(|| StoreError::InvalidObject(format!("{name} missing namespace")))?;

        let mut objects = lock(objects);
        let outcome = match objects.get(&key(&namespace, &name)) {
            None => ApplyOutcome::Created,
            Some(live) => {
                let desired_value = serde_json::to_value(&desired)?;
                let live_value = serde_json::to_value(live)?;
                if !diff::needs_update(&desired_value, &live_value) {
                    return Ok(ApplyOutcome::Unchanged);
                }
                keep_live(live, &mut desired);
                ApplyOutcome::Patched
            }
        };
        desired.meta_mut().resource_version = Some(self.bump_version());
        objects.insert(key(&namespace, &name), desired);
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn get_logstash(&self, namespace: &str, name: &str) -> Result<Logstash, StoreError> {
        self.logstash(namespace, name)
            .ok_or_else(|| StoreError::NotFound(format!("Logstash {namespace}/{name}")))
    }

    async fn update_logstash(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
        let namespace = logstash.metadata.namespace.clone().unwrap_or_default();
        let name = logstash.metadata.name.clone().unwrap_or_default();
        let what = format!("Logstash {namespace}/{name}");
        if self.take_conflict() {
            return Err(StoreError::Conflict(what));
        }

        let mut logstashes = lock(&self.logstashes);
        let live = logstashes
            .get(&key(&namespace, &name))
            .ok_or_else(|| StoreError::NotFound(what.clone()))?;
        if live.metadata.resource_version != logstash.metadata.resource_version {
            return Err(StoreError::Conflict(what));
        }

        let mut updated = logstash.clone();
        updated.status = live.status.clone();
        updated.metadata.deletion_timestamp = live.metadata.deletion_timestamp.clone();
        updated.metadata.resource_version = Some(self.bump_version());

        let released = updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty());
        if released {
            logstashes.remove(&key(&namespace, &name));
        } else {
            logstashes.insert(key(&namespace, &name), updated.clone());
        }
        Ok(updated)
    }

    async fn update_logstash_status(&self, logstash: &Logstash) -> Result<Logstash, StoreError> {
        let namespace = logstash.metadata.namespace.clone().unwrap_or_default();
        let name = logstash.metadata.name.clone().unwrap_or_default();
        let what = format!("Logstash {namespace}/{name} status");
        if self.take_conflict() {
            return Err(StoreError::Conflict(what));
        }

        let mut logstashes = lock(&self.logstashes);
        let live = logstashes
            .get_mut(&key(&namespace, &name))
            .ok_or_else(|| StoreError::NotFound(what.clone()))?;
        if live.metadata.resource_version != logstash.metadata.resource_version {
            return Err(StoreError::Conflict(what));
        }
        live.status = logstash.status.clone();
        live.metadata.resource_version = Some(self.bump_version());
        Ok(live.clone())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.secret(namespace, name)
            .ok_or_else(|| StoreError::NotFound(format!("Secret {namespace}/{name}")))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, StoreError> {
        self.deployment(namespace, name)
            .ok_or_else(|| StoreError::NotFound(format!("Deployment {namespace}/{name}")))
    }

    async fn apply(&self, desired: ChildResource) -> Result<ApplyOutcome, StoreError> {
        let kind = desired.kind();
        let name = desired.name().unwrap_or_default().to_string();
        let outcome = match desired {
            ChildResource::Secret(secret) => self.apply_into(&self.secrets, secret, |_, _| {})?,
            ChildResource::ConfigMap(cm) => self.apply_into(&self.config_maps, cm, |_, _| {})?,
            ChildResource::Service(svc) => self.apply_into(&self.services, svc, |live, desired| {
                desired.status = live.status.clone();
            })?,
            ChildResource::Deployment(deploy) => {
                self.apply_into(&self.deployments, deploy, |live, desired| {
                    desired.status = live.status.clone();
                })?
            }
        };
        lock(&self.applied).push(AppliedRecord {
            kind,
            name,
            outcome,
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::LogstashSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn logstash(name: &str) -> Logstash {
        let mut ls = Logstash::new(name, LogstashSpec::default());
        ls.metadata.namespace = Some("default".to_string());
        ls
    }

    fn config_map(data: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("logstash.conf".to_string(), data.to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_apply_create_then_unchanged_then_patched() {
        let store = MockClusterStore::new();

        let first = store.apply(ChildResource::ConfigMap(config_map("a"))).await.unwrap();
        let second = store.apply(ChildResource::ConfigMap(config_map("a"))).await.unwrap();
        let third = store.apply(ChildResource::ConfigMap(config_map("b"))).await.unwrap();

        assert_eq!(first, ApplyOutcome::Created);
        assert_eq!(second, ApplyOutcome::Unchanged);
        assert_eq!(third, ApplyOutcome::Patched);
        let live = store.config_map("default", "cm").unwrap();
        assert_eq!(live.data.unwrap()["logstash.conf"], "b");
        assert_eq!(store.applied().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let store = MockClusterStore::new();
        let stored = store.insert_logstash(logstash("ls"));

        let mut first = stored.clone();
        first.metadata.labels = Some(BTreeMap::from([("a".to_string(), "b".to_string())]));
        store.update_logstash(&first).await.unwrap();

        let err = store.update_logstash(&stored).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = MockClusterStore::new();
        let stored = store.insert_logstash(logstash("ls"));
        store.inject_conflicts(1);

        assert!(store.update_logstash_status(&stored).await.unwrap_err().is_conflict());
        assert!(store.update_logstash_status(&stored).await.is_ok());
    }

    #[tokio::test]
    async fn test_removing_last_finalizer_releases_deleted_object() {
        let store = MockClusterStore::new();
        let mut ls = logstash("ls");
        ls.metadata.finalizers = Some(vec!["example.com/finalizer".to_string()]);
        store.insert_logstash(ls);
        store.mark_logstash_deleted("default", "ls");

        let mut live = store.get_logstash("default", "ls").await.unwrap();
        assert!(live.metadata.deletion_timestamp.is_some());
        live.metadata.finalizers = Some(Vec::new());
        store.update_logstash(&live).await.unwrap();

        assert!(store.get_logstash("default", "ls").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_apply_keeps_live_deployment_status() {
        let store = MockClusterStore::new();
        let mut deploy = Deployment {
            metadata: ObjectMeta {
                name: Some("d".to_string()),
                namespace: Some("default".to_string()),
                labels: Some(BTreeMap::from([("v".to_string(), "1".to_string())])),
                ..Default::default()
            },
            ..Default::default()
        };
        store.apply(ChildResource::Deployment(deploy.clone())).await.unwrap();
        store.set_deployment_ready_replicas("default", "d", 2);

        deploy.metadata.labels = Some(BTreeMap::from([("v".to_string(), "2".to_string())]));
        let outcome = store.apply(ChildResource::Deployment(deploy)).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Patched);
        let live = store.deployment("default", "d").unwrap();
        assert_eq!(live.status.unwrap().ready_replicas, Some(2));
    }
}
