//! Finalizer-gated lifecycle of a Logstash resource
//!
//! A resource is `Active` until the API server stamps `deletionTimestamp`, then
//! `Terminating`. The finalizer keeps a terminating resource around until the
//! cleanup hook has run. The transition functions are idempotent and only report
//! whether they changed the metadata; callers persist the change.

use crate::error::ControllerError;
use crds::Logstash;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Finalizer token owned by this controller
pub const FINALIZER: &str = "logstash.opensearch.opster.io/finalizer";

/// Lifecycle state of a Logstash resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not marked for deletion
    Active,
    /// Marked for deletion
    Terminating,
}

impl Lifecycle {
    /// Lifecycle state of the object described by `meta`
    pub fn of(meta: &ObjectMeta) -> Self {
        if meta.deletion_timestamp.is_some() {
            Self::Terminating
        } else {
            Self::Active
        }
    }
}

/// True when `meta` carries the controller's finalizer
pub fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|token| token == FINALIZER))
}

/// Adds the finalizer; returns true if it was missing
pub fn add_finalizer(meta: &mut ObjectMeta) -> bool {
    if has_finalizer(meta) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    true
}

/// Removes the finalizer; returns true if it was present
pub fn remove_finalizer(meta: &mut ObjectMeta) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|token| token != FINALIZER);
    finalizers.len() != before
}

/// Cleanup of side effects that ownership-based garbage collection does not cover
#[async_trait::async_trait]
pub trait CleanupHook: Send + Sync {
    /// Runs once per deletion, before the finalizer is removed
    async fn cleanup(&self, instance: &Logstash) -> Result<(), ControllerError>;
}

/// Cleanup hook for deployments without external side effects
///
/// Child objects carry owner references and are collected by the API server.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCleanup;

#[async_trait::async_trait]
impl CleanupHook for NoopCleanup {
    async fn cleanup(&self, _instance: &Logstash) -> Result<(), ControllerError> {
        Ok(())
    }
}
