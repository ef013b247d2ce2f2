//! Deployment builder
//!
//! Starts from the user's pod template and layers the operator's requirements on
//! top. The user always keeps: volumes/mounts named `pipeline`, resource
//! requests/limits, the image, and an explicit `LS_JAVA_OPTS` when `jvm` is empty.
//! The operator always owns: the selector label, `CMHASH`, the credential env
//! vars and the container ports.

use super::configmap::{ENV_LOGSTASH_PASS, ENV_LOGSTASH_USER};
use super::service::port_name;
use super::{ResolvedEndpoint, child_meta};
use crate::credentials::{PASSWORD_KEY, USERNAME_KEY};
use crate::error::ControllerError;
use crate::merge::{merge_env, merge_labels, merge_pipeline_volume, merge_pipeline_volume_mount};
use crate::naming;
use crds::Logstash;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, PodTemplateSpec, ResourceRequirements,
    SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// Image used when the pod template leaves it empty
pub const DEFAULT_IMAGE: &str = "opensearchproject/logstash-oss-with-opensearch-output-plugin:8.4.0";
/// Name given to the Logstash container when the template does not name it
pub const DEFAULT_CONTAINER_NAME: &str = "logstash";
/// JVM options env var
pub const ENV_JAVA_OPTS: &str = "LS_JAVA_OPTS";
/// Heap settings used when `spec.config.jvm` is empty
pub const DEFAULT_JAVA_OPTS: &str = "-Xms512m -Xmx512m";
/// Env var carrying the pipeline content hash
pub const ENV_CONFIG_HASH: &str = "CMHASH";
const DEFAULT_CPU: &str = "500m";
const DEFAULT_MEMORY: &str = "1Gi";

/// Builds the `logstash-{name}-deployment` Deployment
pub fn build_deployment(
    instance: &Logstash,
    endpoint: Option<&ResolvedEndpoint>,
    config_hash: &str,
) -> Result<Deployment, ControllerError> {
    let (namespace, name) = naming::object_key(instance)?;
    let template = build_pod_template(instance, name, endpoint, config_hash);
    Ok(Deployment {
        metadata: child_meta(name, namespace, naming::deployment_name(name)),
        spec: Some(DeploymentSpec {
            replicas: Some(instance.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(naming::selector(name)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn build_pod_template(
    instance: &Logstash,
    name: &str,
    endpoint: Option<&ResolvedEndpoint>,
    config_hash: &str,
) -> PodTemplateSpec {
    let config = &instance.spec.config;
    let mut template = instance.spec.pod_template.clone().unwrap_or_default();

    let meta = template.metadata.get_or_insert_with(Default::default);
    meta.labels = Some(merge_labels(meta.labels.as_ref(), &naming::labels(name)));

    let pod_spec = template.spec.get_or_insert_with(Default::default);
    pod_spec.volumes = Some(merge_pipeline_volume(
        pod_spec.volumes.as_deref().unwrap_or_default(),
        &naming::config_map_name(name),
    ));
    if pod_spec.containers.is_empty() {
        pod_spec.containers.push(Container::default());
    }
    let container = &mut pod_spec.containers[0];
    if container.name.is_empty() {
        container.name = DEFAULT_CONTAINER_NAME.to_string();
    }

    let template_env = container.env.take().unwrap_or_default();
    let mut operator_env = merge_env(&config.env, &credential_env(endpoint));
    operator_env = merge_env(&operator_env, &[plain_env(ENV_CONFIG_HASH, config_hash)]);
    if !config.jvm.is_empty() {
        operator_env = merge_env(&operator_env, &[plain_env(ENV_JAVA_OPTS, &config.jvm)]);
    } else if !has_env(&template_env, ENV_JAVA_OPTS) && !has_env(&operator_env, ENV_JAVA_OPTS) {
        operator_env.push(plain_env(ENV_JAVA_OPTS, DEFAULT_JAVA_OPTS));
    }
    container.env = Some(merge_env(&template_env, &operator_env));

    let resources = container.resources.get_or_insert_with(ResourceRequirements::default);
    if resources.limits.is_none() {
        resources.limits = Some(default_resources());
    }
    if resources.requests.is_none() {
        resources.requests = Some(default_resources());
    }

    container.volume_mounts = Some(merge_pipeline_volume_mount(
        container.volume_mounts.as_deref().unwrap_or_default(),
    ));

    // An empty list would be dropped by the API server and never compare equal
    container.ports = (!config.ports.is_empty()).then(|| {
        config
            .ports
            .iter()
            .map(|&port| ContainerPort {
                name: Some(port_name(port)),
                container_port: port,
                ..Default::default()
            })
            .collect()
    });

    if container.image.as_deref().is_none_or(str::is_empty) {
        container.image = Some(DEFAULT_IMAGE.to_string());
    }

    template
}

fn credential_env(endpoint: Option<&ResolvedEndpoint>) -> Vec<EnvVar> {
    let Some(endpoint) = endpoint else {
        return Vec::new();
    };
    [(ENV_LOGSTASH_USER, USERNAME_KEY), (ENV_LOGSTASH_PASS, PASSWORD_KEY)]
        .into_iter()
        .map(|(var, key)| EnvVar {
            name: var.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: endpoint.credential_secret.clone(),
                    key: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

fn plain_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn has_env(env: &[EnvVar], name: &str) -> bool {
    env.iter().any(|e| e.name == name)
}

fn default_resources() -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(DEFAULT_CPU.to_string())),
        ("memory".to_string(), Quantity(DEFAULT_MEMORY.to_string())),
    ])
}
