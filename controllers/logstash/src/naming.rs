//! Child resource names and labels
//!
//! Every child of a Logstash resource is named `logstash-{name}-{suffix}` and
//! carries the single label `opensearch.opster.io/logstash: {name}`, which is
//! also the Service and Deployment selector.

use crate::error::ControllerError;
use crds::Logstash;
use std::collections::BTreeMap;

/// Label key identifying the owning Logstash resource
pub const LOGSTASH_LABEL: &str = "opensearch.opster.io/logstash";

/// Name of the operator-managed credential Secret
pub fn secret_name(logstash_name: &str) -> String {
    format!("logstash-{logstash_name}-user")
}

/// Name of the rendered pipeline ConfigMap
pub fn config_map_name(logstash_name: &str) -> String {
    format!("logstash-{logstash_name}-pipelines")
}

/// Name of the Service
pub fn service_name(logstash_name: &str) -> String {
    format!("logstash-{logstash_name}-network")
}

/// Name of the Deployment
pub fn deployment_name(logstash_name: &str) -> String {
    format!("logstash-{logstash_name}-deployment")
}

/// Labels applied to every child object
pub fn labels(logstash_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LOGSTASH_LABEL.to_string(), logstash_name.to_string())])
}

/// Selector matching the pods of one Logstash resource
pub fn selector(logstash_name: &str) -> BTreeMap<String, String> {
    labels(logstash_name)
}

/// `(namespace, name)` of a Logstash resource
pub fn object_key(logstash: &Logstash) -> Result<(&str, &str), ControllerError> {
    let name = logstash
        .metadata
        .name
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.name"))?;
    let namespace = logstash
        .metadata
        .namespace
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
    Ok((namespace, name))
}
