//! Cluster object store
//!
//! Thin abstraction over the Kubernetes API used by the Logstash controller.
//! It reads the parent `Logstash` resource, writes its metadata and status with
//! optimistic concurrency, and exposes an idempotent `apply` primitive for the
//! child objects (Secret, ConfigMap, Service, Deployment).
//!
//! # Example
//!
//! ```no_run
//! use cluster_store::{ClusterStore, KubeClusterStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeClusterStore::new(client, "logstash-controller");
//!
//! let logstash = store.get_logstash("default", "my-logstash").await?;
//! println!("replicas: {}", logstash.spec.replicas);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod diff;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterStore;
pub use error::StoreError;
pub use store_trait::{ApplyOutcome, ChildResource, ClusterStore};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterStore;
