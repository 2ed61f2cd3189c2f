//! Conversion of a [`ContainerSpec`] into a Kubernetes [`Deployment`] and [`Service`], see
//! [`build_documents()`].

pub mod env;
pub mod name;
pub mod port;
pub mod volume;

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, PodSpec, PodTemplateSpec, Service, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use smart_default::SmartDefault;

use crate::container::{ContainerSpec, MalformedContainerError};

use self::{
    env::transform_env,
    name::ResourceName,
    port::{PortSet, collect_ports},
    volume::{VolumeSet, build_volumes},
};

/// Options for [`build_documents()`].
#[derive(Debug, SmartDefault, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Namespace set on all generated resources.
    #[default(_code = "ResourceName::default_namespace()")]
    pub namespace: ResourceName,

    /// ID prefix or name the container was selected with.
    pub container_ref: String,
}

/// A [`Deployment`] and, if the container has ports, a [`Service`] exposing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: ResourceName,
    pub deployment: Deployment,
    pub service: Option<Service>,
}

impl Manifest {
    /// Serialize into a multi-document YAML stream.
    ///
    /// The [`Deployment`] is first, followed by a `---` separator and the [`Service`] if there is
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if a document could not be serialized.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut yaml = serde_yaml::to_string(&self.deployment)?;
        if let Some(service) = &self.service {
            yaml.push_str("---\n");
            yaml.push_str(&serde_yaml::to_string(service)?);
        }
        Ok(yaml)
    }
}

/// Name for the generated resources.
///
/// Taken from the container name. If it is empty or only made of invalid characters, the
/// image repository name is used instead.
pub fn resource_name(spec: &ContainerSpec) -> ResourceName {
    ResourceName::try_sanitize(&spec.name)
        .filter(|name| !name.is_fallback())
        .or_else(|| ResourceName::try_sanitize(spec.image_name()))
        .unwrap_or_else(ResourceName::fallback)
}

/// Convert a [`ContainerSpec`] into a [`Manifest`].
///
/// The [`Deployment`] runs a single replica of the container. The [`Service`] is only created
/// when the container has ports, as a service without ports is invalid.
///
/// # Errors
///
/// Returns an error if the container does not have an image.
pub fn build_documents(
    spec: &ContainerSpec,
    config: &ExportConfig,
) -> Result<Manifest, MalformedContainerError> {
    spec.validate()?;

    let name = resource_name(spec);
    let labels = BTreeMap::from([(String::from("app"), name.to_string())]);

    let VolumeSet {
        volumes,
        volume_mounts,
    } = build_volumes(&spec.mounts);
    let PortSet {
        container_ports,
        service_ports,
    } = collect_ports(&spec.ports);
    let env = transform_env(&spec.env);

    let container = Container {
        name: name.to_string(),
        image: Some(spec.image.clone()),
        command: spec.entrypoint.clone().filter(|command| !command.is_empty()),
        args: spec.command.clone().filter(|args| !args.is_empty()),
        env: env.filter_empty(),
        ports: container_ports.filter_empty(),
        volume_mounts: volume_mounts.filter_empty(),
        working_dir: spec.working_dir.clone().filter(|dir| !dir.is_empty()),
        tty: spec.tty.then_some(true),
        stdin: spec.open_stdin.then_some(true),
        ..Container::default()
    };

    let deployment = Deployment {
        metadata: metadata(&name, &config.namespace, &labels),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: volumes.filter_empty(),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        status: None,
    };

    let service = (!service_ports.is_empty()).then(|| Service {
        metadata: metadata(&name.with_suffix("svc"), &config.namespace, &labels),
        spec: Some(ServiceSpec {
            selector: Some(labels.clone()),
            ports: Some(service_ports),
            type_: Some(String::from("ClusterIP")),
            ..ServiceSpec::default()
        }),
        status: None,
    });

    tracing::debug!(
        container = %config.container_ref,
        %name,
        service = service.is_some(),
        "built manifest"
    );

    Ok(Manifest {
        name,
        deployment,
        service,
    })
}

fn metadata(
    name: &ResourceName,
    namespace: &ResourceName,
    labels: &BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..ObjectMeta::default()
    }
}

trait FilterEmpty {
    fn filter_empty(self) -> Option<Self>
    where
        Self: Sized;
}

impl<T> FilterEmpty for Vec<T> {
    fn filter_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use k8s_openapi::api::core::v1::{ContainerPort, EnvVar};

    use crate::container::{Mount, MountKind, PortBinding, Protocol};

    use super::*;

    fn nginx() -> ContainerSpec {
        ContainerSpec {
            id: "0123456789abcdef0123456789abcdef".to_owned(),
            name: "/nginx_1".to_owned(),
            image: "nginx:1.27".to_owned(),
            command: Some(vec!["nginx".to_owned(), "-g".to_owned(), "daemon off;".to_owned()]),
            entrypoint: Some(vec!["/docker-entrypoint.sh".to_owned()]),
            env: vec!["NGINX_PORT=80".to_owned()],
            mounts: vec![Mount {
                kind: MountKind::Bind,
                source: Some("/srv/www".to_owned()),
                destination: "/usr/share/nginx/html".to_owned(),
                name: None,
                read_only: true,
            }],
            ports: vec![PortBinding {
                host_port: Some(8080),
                ..PortBinding::new(80, Protocol::Tcp)
            }],
            ..ContainerSpec::default()
        }
    }

    fn config(namespace: &str) -> ExportConfig {
        ExportConfig {
            namespace: namespace.parse().unwrap(),
            container_ref: "nginx_1".to_owned(),
        }
    }

    fn container(manifest: &Manifest) -> &Container {
        &manifest
            .deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
    }

    #[test]
    fn name_from_container_name() {
        let manifest = build_documents(&nginx(), &ExportConfig::default()).unwrap();
        assert_eq!(manifest.name.as_str(), "nginx-1");
        assert_eq!(
            manifest.deployment.metadata.name.as_deref(),
            Some("nginx-1"),
        );
        assert_eq!(
            manifest.deployment.metadata.namespace.as_deref(),
            Some("default"),
        );
    }

    #[test]
    fn name_falls_back_to_image() {
        let spec = ContainerSpec {
            name: String::new(),
            image: "myregistry/app:latest".to_owned(),
            ..ContainerSpec::default()
        };
        assert_eq!(resource_name(&spec).as_str(), "app");

        let spec = ContainerSpec {
            name: "/__".to_owned(),
            image: "registry.local:5000/team/api-server@sha256:abcd".to_owned(),
            ..ContainerSpec::default()
        };
        assert_eq!(resource_name(&spec).as_str(), "api-server");
    }

    #[test]
    fn deployment() {
        let manifest = build_documents(&nginx(), &config("web")).unwrap();
        let spec = manifest.deployment.spec.as_ref().unwrap();

        assert_eq!(spec.replicas, Some(1));
        let app = BTreeMap::from([("app".to_owned(), "nginx-1".to_owned())]);
        assert_eq!(spec.selector.match_labels.as_ref(), Some(&app));
        assert_eq!(
            spec.template
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.labels.as_ref()),
            Some(&app),
        );

        let container = container(&manifest);
        assert_eq!(container.name, "nginx-1");
        assert_eq!(container.image.as_deref(), Some("nginx:1.27"));
        assert_eq!(
            container.command.as_deref(),
            Some(["/docker-entrypoint.sh".to_owned()].as_slice()),
        );
        assert_eq!(container.args.as_ref().map(Vec::len), Some(3));
        assert_eq!(
            container.env,
            Some(vec![EnvVar {
                name: "NGINX_PORT".to_owned(),
                value: Some("80".to_owned()),
                ..EnvVar::default()
            }]),
        );
        assert_eq!(
            container.ports,
            Some(vec![ContainerPort {
                container_port: 80,
                protocol: Some("TCP".to_owned()),
                ..ContainerPort::default()
            }]),
        );
        assert_eq!(container.volume_mounts.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            spec.template
                .spec
                .as_ref()
                .and_then(|pod| pod.volumes.as_ref())
                .map(Vec::len),
            Some(1),
        );
    }

    #[test]
    fn service() {
        let manifest = build_documents(&nginx(), &config("web")).unwrap();
        let service = manifest.service.unwrap();

        assert_eq!(service.metadata.name.as_deref(), Some("nginx-1-svc"));
        assert_eq!(service.metadata.namespace.as_deref(), Some("web"));

        let spec = service.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(
            spec.selector,
            Some(BTreeMap::from([("app".to_owned(), "nginx-1".to_owned())])),
        );
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8080);
    }

    #[test]
    fn service_ports_unique() {
        let mut spec = nginx();
        spec.ports.push(PortBinding::new(8080, Protocol::Tcp));
        let manifest = build_documents(&spec, &config("web")).unwrap();

        assert_eq!(container(&manifest).ports.as_ref().unwrap().len(), 2);

        let ports = manifest.service.unwrap().spec.unwrap().ports.unwrap();
        let mut keys: Vec<_> = ports
            .iter()
            .map(|port| (port.port, port.protocol.clone()))
            .collect();
        let len = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), len, "{ports:?}");
    }

    #[test]
    fn no_ports_no_service() {
        let spec = ContainerSpec {
            ports: Vec::new(),
            ..nginx()
        };
        let manifest = build_documents(&spec, &ExportConfig::default()).unwrap();
        assert!(manifest.service.is_none());

        let yaml = manifest.to_yaml().unwrap();
        assert!(!yaml.contains("kind: Service"));
        assert!(!yaml.contains("---"));
    }

    #[test]
    fn minimal_container_omits_sections() {
        let spec = ContainerSpec {
            name: "/worker".to_owned(),
            image: "busybox".to_owned(),
            command: Some(Vec::new()),
            ..ContainerSpec::default()
        };
        let manifest = build_documents(&spec, &ExportConfig::default()).unwrap();

        let container = container(&manifest);
        assert_eq!(container.args, None);
        assert_eq!(container.command, None);
        assert_eq!(container.env, None);
        assert_eq!(container.ports, None);
        assert_eq!(container.volume_mounts, None);
        assert_eq!(container.tty, None);
    }

    #[test]
    fn missing_image() {
        let spec = ContainerSpec {
            image: String::new(),
            ..nginx()
        };
        assert_eq!(
            build_documents(&spec, &ExportConfig::default()),
            Err(MalformedContainerError::MissingField("image")),
        );
    }

    #[test]
    fn input_not_mutated() {
        let spec = nginx();
        let before = spec.clone();
        let first = build_documents(&spec, &ExportConfig::default()).unwrap();
        let second = build_documents(&spec, &ExportConfig::default()).unwrap();
        assert_eq!(spec, before);
        assert_eq!(first, second);
    }

    #[test]
    fn yaml_round_trip() {
        let manifest = build_documents(&nginx(), &config("web")).unwrap();
        let yaml = manifest.to_yaml().unwrap();

        let mut documents = serde_yaml::Deserializer::from_str(&yaml);
        let deployment: Deployment =
            serde::Deserialize::deserialize(documents.next().unwrap()).unwrap();
        let service: Service = serde::Deserialize::deserialize(documents.next().unwrap()).unwrap();
        assert!(documents.next().is_none());

        assert!(yaml.starts_with("apiVersion: apps/v1\nkind: Deployment\n"));
        assert!(yaml.contains("---\napiVersion: v1\nkind: Service\n"));

        assert_eq!(deployment.metadata.name.as_deref(), Some("nginx-1"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("web"));
        assert_eq!(
            deployment
                .spec
                .and_then(|spec| spec.template.spec)
                .and_then(|pod| pod.containers.into_iter().next())
                .and_then(|container| container.image)
                .as_deref(),
            Some("nginx:1.27"),
        );
        assert_eq!(service.metadata.name.as_deref(), Some("nginx-1-svc"));
        assert_eq!(service.metadata.namespace.as_deref(), Some("web"));
    }
}
