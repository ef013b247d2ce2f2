//! Controller configuration
//!
//! Read once at startup from environment variables.

use crate::error::ControllerError;
use std::time::Duration;

/// Field manager used for server-side apply when none is configured
pub const DEFAULT_FIELD_MANAGER: &str = "logstash-controller";
const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_SECONDS: u64 = 5;

/// Runtime settings for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Field manager for server-side apply
    pub field_manager: String,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Quiet period after the last event before reconciling
    pub debounce: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            debounce: Duration::from_secs(DEFAULT_DEBOUNCE_SECONDS),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let concurrency = match get("RECONCILE_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                ControllerError::InvalidConfig(format!("RECONCILE_CONCURRENCY={raw}: {e}"))
            })?,
            None => defaults.concurrency,
        };
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let debounce = match get("RECONCILE_DEBOUNCE_SECONDS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                ControllerError::InvalidConfig(format!("RECONCILE_DEBOUNCE_SECONDS={raw}: {e}"))
            })?),
            None => defaults.debounce,
        };

        Ok(Self {
            namespace: get("WATCH_NAMESPACE"),
            field_manager: get("FIELD_MANAGER").unwrap_or(defaults.field_manager),
            concurrency,
            debounce,
        })
    }
}
