//! Conversion of Docker [`PortBinding`]s into Kubernetes [`ContainerPort`]s and [`ServicePort`]s.

use std::collections::HashSet;

use k8s_openapi::{
    api::core::v1::{ContainerPort, ServicePort},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::container::PortBinding;

/// Container ports and the [`Service`](k8s_openapi::api::core::v1::Service) ports which expose
/// them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortSet {
    pub container_ports: Vec<ContainerPort>,
    pub service_ports: Vec<ServicePort>,
}

/// Convert [`PortBinding`]s into a [`PortSet`].
///
/// Bindings are deduplicated by container port and protocol, keeping the first occurrence.
/// Output order follows the input.
///
/// The service port is the published host port if there is one, otherwise the container port.
/// If that port is already exposed by the service for the same protocol, the container port is
/// used instead. A binding whose service ports are both taken is only a container port.
pub fn collect_ports(ports: &[PortBinding]) -> PortSet {
    let mut seen = HashSet::new();
    let mut exposed = HashSet::new();
    let mut set = PortSet::default();

    for port in ports {
        if !seen.insert((port.container_port, port.protocol)) {
            continue;
        }

        let container_port = i32::from(port.container_port);
        let protocol = port.protocol.as_k8s_str();

        set.container_ports.push(ContainerPort {
            container_port,
            protocol: Some(protocol.to_owned()),
            ..ContainerPort::default()
        });

        let Some(service_port) = port
            .host_port
            .into_iter()
            .chain([port.container_port])
            .find(|service_port| exposed.insert((*service_port, port.protocol)))
        else {
            tracing::warn!(
                port = port.container_port,
                protocol = %port.protocol,
                "service port already in use, not exposing container port"
            );
            continue;
        };

        set.service_ports.push(ServicePort {
            name: Some(format!("port-{}-{}", port.container_port, port.protocol)),
            port: i32::from(service_port),
            target_port: Some(IntOrString::Int(container_port)),
            protocol: Some(protocol.to_owned()),
            ..ServicePort::default()
        });
    }

    set
}
