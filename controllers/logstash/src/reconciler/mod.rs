//! Reconciliation logic for Logstash resources.
//!
//! One pass walks the sub-reconcilers in [`PASS_ORDER`]. Each owns one child
//! object type (or, for `Endpoint` and `Status`, one piece of derived state) and
//! lives in its own module:
//! - `secret`: operator-managed credential Secret
//! - `endpoint`: OpenSearch URL and credential Secret lookup
//! - `configmap`: rendered pipeline and its content hash
//! - `service`: network Service
//! - `deployment`: Logstash Deployment
//! - `status`: phase derived from Deployment readiness

pub mod configmap;
pub mod deployment;
pub mod endpoint;
pub mod secret;
pub mod service;
pub mod status;
#[cfg(test)]
mod reconciler_test;

use crate::backoff::BackoffRegistry;
use crate::builders::ResolvedEndpoint;
use crate::credentials::{CredentialSource, RandomCredentials};
use crate::error::ControllerError;
use crate::lifecycle::{self, CleanupHook, Lifecycle, NoopCleanup};
use crate::retry::{RetryPolicy, retry_on_conflict};
use cluster_store::{ClusterStore, StoreError};
use crds::{Logstash, LogstashPhase, LogstashStatus};
use kube::Resource;
use kube_runtime::controller::Action;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One step of a reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubReconciler {
    /// Operator-managed credential Secret
    Secret,
    /// Resolve the OpenSearch URL and credential Secret
    Endpoint,
    /// Pipeline ConfigMap (produces the content hash)
    ConfigMap,
    /// Network Service
    Service,
    /// Logstash Deployment (consumes endpoint and hash)
    Deployment,
    /// Phase derived from Deployment readiness
    Status,
}

/// Fixed execution order; `Endpoint` must precede `ConfigMap` and `Deployment`
pub const PASS_ORDER: [SubReconciler; 6] = [
    SubReconciler::Secret,
    SubReconciler::Endpoint,
    SubReconciler::ConfigMap,
    SubReconciler::Service,
    SubReconciler::Deployment,
    SubReconciler::Status,
];

impl SubReconciler {
    /// Runs this step; returns true when it changed something in the cluster
    pub async fn run(self, reconciler: &Reconciler, pass: &mut Pass) -> Result<bool, ControllerError> {
        match self {
            Self::Secret => reconciler.reconcile_secret(pass).await,
            Self::Endpoint => reconciler.resolve_endpoint(pass).await,
            Self::ConfigMap => reconciler.reconcile_config_map(pass).await,
            Self::Service => reconciler.reconcile_service(pass).await,
            Self::Deployment => reconciler.reconcile_deployment(pass).await,
            Self::Status => reconciler.reconcile_status(pass).await,
        }
    }
}

/// State threaded through one reconcile pass
#[derive(Debug, Clone)]
pub struct Pass {
    /// Latest known copy of the parent resource
    pub instance: Logstash,
    /// Set by `Endpoint` when a cluster is referenced
    pub endpoint: Option<ResolvedEndpoint>,
    /// Set by `ConfigMap`
    pub config_hash: Option<String>,
}

impl Pass {
    fn new(instance: Logstash) -> Self {
        Self {
            instance,
            endpoint: None,
            config_hash: None,
        }
    }

    /// Namespace of the parent
    pub fn namespace(&self) -> Result<&str, ControllerError> {
        self.instance
            .metadata
            .namespace
            .as_deref()
            .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))
    }

    /// Name of the parent
    pub fn name(&self) -> Result<&str, ControllerError> {
        self.instance
            .metadata
            .name
            .as_deref()
            .ok_or(ControllerError::MissingObjectKey("metadata.name"))
    }

    /// Sets the parent as controlling owner of `child`
    pub fn owned<K>(&self, mut child: K) -> Result<K, ControllerError>
    where
        K: Resource,
    {
        let owner = self
            .instance
            .controller_owner_ref(&())
            .ok_or(ControllerError::MissingObjectKey("metadata.uid"))?;
        child.meta_mut().owner_references = Some(vec![owner]);
        Ok(child)
    }
}

/// Reconciles Logstash resources.
pub struct Reconciler {
    pub(crate) store: Box<dyn ClusterStore>,
    pub(crate) credentials: Box<dyn CredentialSource>,
    cleanup: Box<dyn CleanupHook>,
    pub(crate) retry: RetryPolicy,
    /// Requeue backoff per resource (namespace/name)
    backoff: BackoffRegistry,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("retry", &self.retry)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler with random credentials and no external cleanup.
    pub fn new(store: impl ClusterStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            credentials: Box::new(RandomCredentials),
            cleanup: Box::new(NoopCleanup),
            retry: RetryPolicy::default(),
            backoff: BackoffRegistry::default(),
        }
    }

    /// Replaces the credential source
    #[must_use]
    pub fn with_credentials(mut self, source: impl CredentialSource + 'static) -> Self {
        self.credentials = Box::new(source);
        self
    }

    /// Replaces the cleanup hook run on deletion
    #[must_use]
    pub fn with_cleanup(mut self, hook: impl CleanupHook + 'static) -> Self {
        self.cleanup = Box::new(hook);
        self
    }

    /// Replaces the conflict retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reconciles one Logstash resource by namespaced name.
    pub async fn reconcile_logstash(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        info!("Reconciling Logstash {}/{}", namespace, name);

        let instance = match self.store.get_logstash(namespace, name).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                debug!("Logstash {}/{} no longer exists, nothing to do", namespace, name);
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e.into()),
        };

        match Lifecycle::of(&instance.metadata) {
            Lifecycle::Terminating => self.finalize(namespace, name, &instance).await,
            Lifecycle::Active => self.converge(namespace, name).await,
        }
    }

    async fn converge(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        match self.run_pass(namespace, name).await {
            Err(ControllerError::ParentDeleted { .. }) => {
                debug!("Logstash {}/{} deleted mid-pass, nothing to do", namespace, name);
                Ok(Action::await_change())
            }
            other => other,
        }
    }

    async fn run_pass(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        let instance = self.ensure_finalizer(namespace, name).await?;
        let instance = self.ensure_initial_status(namespace, name, instance).await?;

        let mut pass = Pass::new(instance);
        let mut changed = 0;
        for step in PASS_ORDER {
            if step.run(self, &mut pass).await? {
                changed += 1;
            }
        }

        if changed > 0 {
            info!("Logstash {}/{} reconciled ({} changes)", namespace, name, changed);
        } else {
            debug!("Logstash {}/{} already up-to-date", namespace, name);
        }
        Ok(Action::await_change())
    }

    async fn ensure_finalizer(&self, namespace: &str, name: &str) -> Result<Logstash, ControllerError> {
        retry_on_conflict(self.retry, "add finalizer", || async move {
            let mut instance = self.fetch_parent(namespace, name).await?;
            if !lifecycle::add_finalizer(&mut instance.metadata) {
                return Ok(instance);
            }
            debug!("Adding finalizer to Logstash {}/{}", namespace, name);
            self.store
                .update_logstash(&instance)
                .await
                .map_err(|e| parent_error(e, namespace, name))
        })
        .await
    }

    async fn ensure_initial_status(
        &self,
        namespace: &str,
        name: &str,
        instance: Logstash,
    ) -> Result<Logstash, ControllerError> {
        if instance.status.as_ref().and_then(|s| s.phase).is_some() {
            return Ok(instance);
        }
        retry_on_conflict(self.retry, "initialize status", || async move {
            let mut instance = self.fetch_parent(namespace, name).await?;
            if instance.status.as_ref().and_then(|s| s.phase).is_some() {
                return Ok(instance);
            }
            instance.status = Some(LogstashStatus {
                phase: Some(LogstashPhase::Pending),
                last_transition_time: Some(chrono::Utc::now()),
            });
            self.store
                .update_logstash_status(&instance)
                .await
                .map_err(|e| parent_error(e, namespace, name))
        })
        .await
    }

    async fn finalize(&self, namespace: &str, name: &str, instance: &Logstash) -> Result<Action, ControllerError> {
        if !lifecycle::has_finalizer(&instance.metadata) {
            debug!("Logstash {}/{} is terminating without our finalizer, nothing to do", namespace, name);
            return Ok(Action::await_change());
        }

        info!("Finalizing Logstash {}/{}", namespace, name);
        self.cleanup.cleanup(instance).await?;

        retry_on_conflict(self.retry, "remove finalizer", || async move {
            let mut live = match self.fetch_parent(namespace, name).await {
                Ok(live) => live,
                Err(ControllerError::ParentDeleted { .. }) => return Ok(()),
                Err(e) => return Err(e),
            };
            if lifecycle::remove_finalizer(&mut live.metadata) {
                match self.store.update_logstash(&live).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })
        .await?;

        info!("Removed finalizer from Logstash {}/{}", namespace, name);
        Ok(Action::await_change())
    }

    /// Re-reads the parent within a pass
    pub(crate) async fn fetch_parent(&self, namespace: &str, name: &str) -> Result<Logstash, ControllerError> {
        self.store
            .get_logstash(namespace, name)
            .await
            .map_err(|e| parent_error(e, namespace, name))
    }

    /// Requeue delay after a failed pass (Fibonacci, per resource)
    pub fn error_backoff(&self, resource_key: &str) -> Duration {
        let (delay, error_count) = self.backoff.record_failure(resource_key);
        if error_count > 1 {
            warn!(
                "Logstash {} failed {} times in a row, retrying in {}s",
                resource_key,
                error_count,
                delay.as_secs()
            );
        }
        delay
    }

    /// Reset backoff after a successful pass
    pub fn reset_error(&self, resource_key: &str) {
        self.backoff.record_success(resource_key);
    }
}

/// Maps a store error on the parent, turning not-found into [`ControllerError::ParentDeleted`]
pub(crate) fn parent_error(err: StoreError, namespace: &str, name: &str) -> ControllerError {
    if err.is_not_found() {
        ControllerError::ParentDeleted {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    } else {
        err.into()
    }
}
