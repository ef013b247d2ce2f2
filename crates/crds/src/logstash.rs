//! Logstash CRD
//!
//! Declares a Logstash workload: replica count, a pod template override and the
//! pipeline configuration the operator renders into a ConfigMap.

use k8s_openapi::api::core::v1::{EnvVar, PodTemplateSpec};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::{LocalObjectRef, OpenSearchClusterRef};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "opensearch.opster.io",
    version = "v1",
    kind = "Logstash",
    plural = "logstashes",
    shortname = "ls",
    namespaced,
    status = "LogstashStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LogstashSpec {
    /// Desired number of Logstash pods
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub replicas: i32,

    /// Pod template override, merged over the operator defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub pod_template: Option<PodTemplateSpec>,

    /// Logstash configuration
    pub config: LogstashConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogstashConfig {
    /// JVM options passed through `LS_JAVA_OPTS` (default heap is used when empty)
    #[serde(default)]
    pub jvm: String,

    /// Extra environment variables for the Logstash container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "preserve_unknown_list")]
    pub env: Vec<EnvVar>,

    /// Reference to an externally managed pipeline manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_config_ref: Option<LocalObjectRef>,

    /// TCP ports exposed by the Service and the container
    #[serde(default)]
    pub ports: Vec<i32>,

    /// OpenSearch cluster the generated output stanza ships events to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opensearch_cluster_ref: Option<OpenSearchClusterRef>,

    /// Inline pipeline fragments
    #[serde(default)]
    pub pipeline: PipelineFragments,
}

/// Opaque `input`, `filter` and `output` stanza bodies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFragments {
    /// Body of the `input { }` block
    #[serde(default)]
    pub inputs: String,

    /// Body of the `filter { }` block
    #[serde(default)]
    pub filters: String,

    /// Body of the `output { }` block
    #[serde(default)]
    pub outputs: String,

    /// Index pattern for the generated OpenSearch output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opensearch_index: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogstashStatus {
    /// Coarse lifecycle phase derived from the owned Deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<LogstashPhase>,

    /// When the phase last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Logstash phase
///
/// Serialized upper-case ("PENDING", "RUNNING").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogstashPhase {
    /// Readiness not proven yet
    #[default]
    Pending,

    /// All declared replicas are ready
    Running,
}

impl std::fmt::Display for LogstashPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Running => f.write_str("RUNNING"),
        }
    }
}

fn preserve_unknown_object(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

fn preserve_unknown_list(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}
