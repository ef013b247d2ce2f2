//! Logstash Controller
//!
//! Reconciles `Logstash` custom resources into the objects that run them:
//! - Secret: operator-managed credentials for the OpenSearch output
//! - ConfigMap: rendered pipeline (`logstash.conf`)
//! - Service: one TCP port per configured input port
//! - Deployment: the Logstash pods, rolled whenever the pipeline changes
//!
//! Status reports `PENDING` until every desired replica is ready, then `RUNNING`.

mod backoff;
mod builders;
mod config;
mod controller;
mod credentials;
mod error;
mod lifecycle;
mod merge;
mod naming;
mod reconciler;
mod retry;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Logstash Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Field manager: {}", config.field_manager);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {}s", config.debounce.as_secs());

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
