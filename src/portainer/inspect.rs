//! Selected output of the Docker container inspect API, see [`ContainerInspect`].

use indexmap::IndexMap;
use serde::{Deserialize, de::IgnoredAny};

use crate::container::{
    ContainerSpec, MalformedContainerError, Mount, MountKind, PortBinding, Protocol,
};

/// Ports in the `"{port}/{protocol}"` form, mapped to their host bindings.
type PortMap = IndexMap<String, Option<Vec<HostBinding>>>;

/// Response of `GET /containers/{id}/json`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    id: String,

    #[serde(default)]
    name: String,

    #[serde(default)]
    config: Option<Config>,

    #[serde(default)]
    mounts: Vec<InspectMount>,

    #[serde(default)]
    network_settings: Option<NetworkSettings>,

    #[serde(default)]
    host_config: Option<HostConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct Config {
    #[serde(default)]
    image: Option<String>,

    #[serde(default)]
    cmd: Option<Vec<String>>,

    #[serde(default)]
    entrypoint: Option<Vec<String>>,

    #[serde(default)]
    env: Option<Vec<String>>,

    #[serde(default)]
    working_dir: Option<String>,

    #[serde(default)]
    tty: bool,

    #[serde(default)]
    open_stdin: bool,

    /// Values are always empty objects.
    #[serde(default)]
    exposed_ports: Option<IndexMap<String, IgnoredAny>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
    #[serde(rename = "Type")]
    kind: String,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    source: String,

    destination: String,

    #[serde(rename = "RW", default = "read_write")]
    read_write: bool,
}

const fn read_write() -> bool {
    true
}

/// Only present while the container is running.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    ports: Option<PortMap>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct HostConfig {
    #[serde(default)]
    port_bindings: Option<PortMap>,

    /// Mount destination to tmpfs options.
    #[serde(default)]
    tmpfs: Option<IndexMap<String, String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct HostBinding {
    #[serde(default)]
    host_port: String,
}

impl TryFrom<ContainerInspect> for ContainerSpec {
    type Error = MalformedContainerError;

    fn try_from(
        ContainerInspect {
            id,
            name,
            config,
            mounts,
            network_settings,
            host_config,
        }: ContainerInspect,
    ) -> Result<Self, Self::Error> {
        let Config {
            image,
            cmd,
            entrypoint,
            env,
            working_dir,
            tty,
            open_stdin,
            exposed_ports,
        } = config.unwrap_or_default();
        let HostConfig {
            port_bindings,
            tmpfs,
        } = host_config.unwrap_or_default();

        let image = image
            .filter(|image| !image.trim().is_empty())
            .ok_or(MalformedContainerError::MissingField("image"))?;

        // Running containers report published ports in `NetworkSettings`, stopped containers only
        // have `HostConfig`. Duplicates are removed when building the manifest.
        let ports = network_settings
            .and_then(|settings| settings.ports)
            .into_iter()
            .flatten()
            .chain(port_bindings.into_iter().flatten())
            .chain(
                exposed_ports
                    .into_iter()
                    .flatten()
                    .map(|(port, IgnoredAny)| (port, None)),
            )
            .filter_map(|(port, bindings)| parse_port(&port, bindings.as_deref()))
            .collect();

        let mounts = mounts
            .into_iter()
            .filter_map(InspectMount::into_mount)
            .chain(tmpfs.into_iter().flatten().map(|(destination, _options)| Mount {
                kind: MountKind::Tmpfs,
                source: None,
                destination,
                name: None,
                read_only: false,
            }))
            .collect();

        Ok(Self {
            id,
            name,
            image,
            command: cmd,
            entrypoint,
            env: env.unwrap_or_default(),
            mounts,
            ports,
            working_dir,
            tty,
            open_stdin,
        })
    }
}

/// Parse a `"{port}/{protocol}"` key and use the first non-empty host port from `bindings`.
///
/// Returns [`None`] and logs a warning if the key cannot be parsed.
fn parse_port(key: &str, bindings: Option<&[HostBinding]>) -> Option<PortBinding> {
    let Some((port, protocol)) = key.split_once('/') else {
        tracing::warn!(port = key, "skipping port without a protocol");
        return None;
    };

    let container_port = port
        .parse()
        .inspect_err(|error| tracing::warn!(port = key, %error, "skipping invalid port"))
        .ok()?;
    let protocol: Protocol = protocol
        .parse()
        .inspect_err(|error| tracing::warn!(port = key, %error, "skipping port"))
        .ok()?;

    let host_port = bindings
        .unwrap_or_default()
        .iter()
        .find_map(|binding| binding.host_port.parse().ok());

    Some(PortBinding {
        host_port,
        ..PortBinding::new(container_port, protocol)
    })
}

impl InspectMount {
    fn into_mount(self) -> Option<Mount> {
        let Self {
            kind,
            name,
            source,
            destination,
            read_write,
        } = self;

        let kind = match kind.as_str() {
            "bind" => MountKind::Bind,
            "volume" => MountKind::Volume,
            "tmpfs" => MountKind::Tmpfs,
            kind => {
                tracing::warn!(kind, %destination, "skipping unsupported mount type");
                return None;
            }
        };

        Some(Mount {
            kind,
            source: (!source.is_empty()).then_some(source),
            destination,
            name: name.filter(|name| !name.is_empty()),
            read_only: !read_write,
        })
    }
}
