//! Service builder

use super::child_meta;
use crate::error::ControllerError;
use crate::naming;
use crds::Logstash;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Name of the Service and container port for `port`
pub fn port_name(port: i32) -> String {
    format!("p{port}")
}

/// Builds the `logstash-{name}-network` Service, one TCP port per declared port
///
/// Fails when no ports are declared or a port is outside 1..=65535.
pub fn build_service(instance: &Logstash) -> Result<Service, ControllerError> {
    let (namespace, name) = naming::object_key(instance)?;
    let ports = &instance.spec.config.ports;
    if ports.is_empty() {
        return Err(ControllerError::InvalidSpec(format!(
            "Logstash {namespace}/{name} declares no ports, cannot build a Service"
        )));
    }
    if let Some(bad) = ports.iter().find(|p| !(1..=65535).contains(*p)) {
        return Err(ControllerError::InvalidSpec(format!(
            "Logstash {namespace}/{name} declares invalid port {bad}"
        )));
    }

    Ok(Service {
        metadata: child_meta(name, namespace, naming::service_name(name)),
        spec: Some(ServiceSpec {
            publish_not_ready_addresses: Some(true),
            selector: Some(naming::selector(name)),
            ports: Some(
                ports
                    .iter()
                    .map(|&port| ServicePort {
                        name: Some(port_name(port)),
                        protocol: Some("TCP".to_string()),
                        port,
                        target_port: Some(IntOrString::Int(port)),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    })
}
