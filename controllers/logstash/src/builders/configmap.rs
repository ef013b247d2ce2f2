//! Pipeline ConfigMap builder
//!
//! Renders `input {}`, `filter {}` and `output {}` blocks into `logstash.conf`
//! and returns a SHA-256 of the rendered text. The Deployment carries that hash
//! in `CMHASH`, so any pipeline change rolls the pods.

use super::{ResolvedEndpoint, child_meta};
use crate::error::ControllerError;
use crate::naming;
use crds::{Logstash, LogstashConfig};
use k8s_openapi::api::core::v1::ConfigMap;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// ConfigMap key the pipeline is stored under
pub const PIPELINE_KEY: &str = "logstash.conf";
/// Index pattern of the generated OpenSearch output
pub const DEFAULT_INDEX: &str = "opensearch-logstash-%{+YYYY.MM.dd}";
/// Env var the generated output reads the cluster username from
pub const ENV_LOGSTASH_USER: &str = "LOGSTASHUSER";
/// Env var the generated output reads the cluster password from
pub const ENV_LOGSTASH_PASS: &str = "LOGSTASHPASS";

const DEFAULT_INPUT: &str = "http {\n  port => 8080\n}\n";
const DEFAULT_OUTPUT: &str = "stdout {}\n";

/// Builds the pipeline ConfigMap and the hash of its content
pub fn build_config_map(
    instance: &Logstash,
    endpoint: Option<&ResolvedEndpoint>,
) -> Result<(ConfigMap, String), ControllerError> {
    let (namespace, name) = naming::object_key(instance)?;
    let pipeline = render_pipeline(&instance.spec.config, endpoint);
    let hash = content_hash(&pipeline);
    let config_map = ConfigMap {
        metadata: child_meta(name, namespace, naming::config_map_name(name)),
        data: Some(BTreeMap::from([(PIPELINE_KEY.to_string(), pipeline)])),
        ..Default::default()
    };
    Ok((config_map, hash))
}

/// Full `logstash.conf` text
pub fn render_pipeline(config: &LogstashConfig, endpoint: Option<&ResolvedEndpoint>) -> String {
    let inputs = if config.pipeline.inputs.is_empty() {
        DEFAULT_INPUT
    } else {
        config.pipeline.inputs.as_str()
    };
    format!(
        "input {{\n{inputs}\n}}\nfilter {{\n{filters}\n}}\noutput {{\n{outputs}\n}}",
        filters = config.pipeline.filters,
        outputs = render_outputs(config, endpoint),
    )
}

/// Body of the `output {}` block
///
/// `stdout {}` when neither outputs nor a cluster are configured. Otherwise the
/// user outputs, followed by an `opensearch {}` stanza once the cluster URL has
/// been resolved.
pub fn render_outputs(config: &LogstashConfig, endpoint: Option<&ResolvedEndpoint>) -> String {
    let pipeline = &config.pipeline;
    if pipeline.outputs.is_empty() && config.opensearch_cluster_ref.is_none() {
        return DEFAULT_OUTPUT.to_string();
    }

    let mut outputs = format!("{}\n", pipeline.outputs);
    if let (Some(_), Some(endpoint)) = (&config.opensearch_cluster_ref, endpoint) {
        let index = pipeline
            .opensearch_index
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_INDEX);
        outputs.push_str(&opensearch_output(&endpoint.url, index));
    }
    outputs.push('\n');
    outputs
}

// Credentials are referenced through env vars, never written into the ConfigMap
fn opensearch_output(url: &str, index: &str) -> String {
    format!(
        "opensearch {{\n  hosts => [\"{url}\"]\n  user => \"${{{ENV_LOGSTASH_USER}}}\"\n  password => \"${{{ENV_LOGSTASH_PASS}}}\"\n  ssl => true\n  ssl_certificate_verification => false\n  index => \"{index}\"\n}}\n"
    )
}

/// Lowercase hex SHA-256 of `content`
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}
