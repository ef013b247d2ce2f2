//! Kubernetes resource watchers.
//!
//! Drives reconciliation with `kube_runtime::Controller`. Logstash resources are
//! watched directly; Deployments, ConfigMaps, Services and Secrets are watched
//! through their owner reference, so a child change (notably Deployment
//! readiness) re-enqueues the parent.

use crate::config::ControllerConfig as Settings;
use crate::error::ControllerError;
use crate::naming;
use crate::reconciler::Reconciler;
use crds::Logstash;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::{Api, Client, Resource};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use tracing::{debug, error, info};

async fn reconcile(obj: Arc<Logstash>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let (namespace, name) = naming::object_key(&obj)?;
    let resource_key = format!("{namespace}/{name}");
    let action = ctx.reconcile_logstash(namespace, name).await?;
    ctx.reset_error(&resource_key);
    Ok(action)
}

// Requeue with per-object Fibonacci backoff
fn error_policy(obj: Arc<Logstash>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let resource_key = match naming::object_key(&obj) {
        Ok((namespace, name)) => format!("{namespace}/{name}"),
        Err(_) => "<unnamed>".to_string(),
    };
    let delay = ctx.error_backoff(&resource_key);
    error!(
        "Reconciliation error for Logstash {}: {} (requeue in {}s)",
        resource_key,
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Watches Logstash resources and their children.
pub struct Watcher {
    client: Client,
    reconciler: Arc<Reconciler>,
    settings: Settings,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(client: Client, reconciler: Arc<Reconciler>, settings: Settings) -> Self {
        Self {
            client,
            reconciler,
            settings,
        }
    }

    /// Runs the controller loop until SIGTERM or Ctrl-C drains it.
    pub async fn watch_logstashes(&self) -> Result<(), ControllerError> {
        let namespace = self.settings.namespace.as_deref();
        info!(
            "Starting Logstash watcher (namespace: {})",
            namespace.unwrap_or("all namespaces")
        );

        let logstashes: Api<Logstash> = scoped_api(&self.client, namespace);
        let controller_config = ControllerConfig::default()
            .debounce(self.settings.debounce)
            .concurrency(self.settings.concurrency);

        Controller::new(logstashes, watcher::Config::default())
            .owns(scoped_api::<Deployment>(&self.client, namespace), watcher::Config::default())
            .owns(scoped_api::<ConfigMap>(&self.client, namespace), watcher::Config::default())
            .owns(scoped_api::<Service>(&self.client, namespace), watcher::Config::default())
            .owns(scoped_api::<Secret>(&self.client, namespace), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _action)) => debug!(
                        "Reconciled Logstash {}/{}",
                        obj.namespace.as_deref().unwrap_or_default(),
                        obj.name
                    ),
                    Err(e) => error!("Controller error for Logstash: {}", e),
                }
            })
            .await;

        info!("Logstash watcher stopped");
        Ok(())
    }
}
