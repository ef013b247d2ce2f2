//! Main controller implementation.
//!
//! Wires the Kubernetes client, the server-side-apply store and the reconciler
//! together, then runs the Logstash watcher in a background task.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_store::KubeClusterStore;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Logstash resource management.
pub struct Controller {
    logstash_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Logstash Controller");

        let kube_client = Client::try_default().await?;
        let store = KubeClusterStore::new(kube_client.clone(), config.field_manager.clone());
        let reconciler = Arc::new(Reconciler::new(store));

        let watcher = Watcher::new(kube_client, reconciler, config);
        let logstash_watcher = tokio::spawn(async move { watcher.watch_logstashes().await });

        Ok(Self { logstash_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Logstash Controller running");

        self.logstash_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("Logstash watcher panicked: {}", e)))??;

        info!("Logstash Controller shut down");
        Ok(())
    }
}
