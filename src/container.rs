//! The container configuration consumed by the manifest builder, see [`ContainerSpec`].

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use thiserror::Error;

/// Configuration of a single Docker container.
///
/// Usually created from the output of the Docker inspect API, see
/// [`ContainerInspect`](crate::portainer::inspect::ContainerInspect).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Full container ID.
    pub id: String,

    /// Raw container name, Docker prefixes it with a `/`.
    pub name: String,

    /// Image reference, e.g. `registry.example.com/app:1.0`.
    pub image: String,

    /// Docker `Cmd`, becomes the Kubernetes container `args`.
    pub command: Option<Vec<String>>,

    /// Docker `Entrypoint`, becomes the Kubernetes container `command`.
    pub entrypoint: Option<Vec<String>>,

    /// `KEY=VALUE` environment entries, in order.
    pub env: Vec<String>,

    pub mounts: Vec<Mount>,

    pub ports: Vec<PortBinding>,

    pub working_dir: Option<String>,

    pub tty: bool,

    pub open_stdin: bool,
}

impl ContainerSpec {
    /// The first 12 characters of the container ID, for display only.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }

    /// The repository part of the image, without registry, tag, or digest.
    ///
    /// E.g. `app` for `registry.example.com/team/app:1.0`.
    pub fn image_name(&self) -> &str {
        image_to_name(&self.image)
    }

    /// Ensure all fields required to build a manifest are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty.
    pub fn validate(&self) -> Result<(), MalformedContainerError> {
        if self.image.trim().is_empty() {
            return Err(MalformedContainerError::MissingField("image"));
        }
        Ok(())
    }
}

/// Takes an image reference and returns the repository name.
fn image_to_name(image: &str) -> &str {
    let image = image.split_once('@').map_or(image, |(image, _digest)| image);
    let image = image.rsplit('/').next().unwrap_or(image);
    // Remove image tag
    image.split_once(':').map_or(image, |(name, _)| name)
}

/// A [`ContainerSpec`] could not be converted because a required field is missing or invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedContainerError {
    #[error("container is missing required field `{0}`")]
    MissingField(&'static str),
}

/// A volume or bind mount attached to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountKind,

    /// Host path for bind mounts.
    pub source: Option<String>,

    /// Path inside the container.
    pub destination: String,

    /// Name of the Docker volume, only set for [`MountKind::Volume`].
    pub name: Option<String>,

    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Bind,
    Volume,
    Tmpfs,
}

/// A container port, optionally published on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_port: Option<u16>,
}

impl PortBinding {
    pub const fn new(container_port: u16, protocol: Protocol) -> Self {
        Self {
            container_port,
            protocol,
            host_port: None,
        }
    }
}

/// Transport protocol of a [`PortBinding`].
///
/// Parsed case-insensitively, displayed lowercase as Docker does.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }

    /// Uppercase form used in Kubernetes manifests.
    pub const fn as_k8s_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else if s.eq_ignore_ascii_case("sctp") {
            Ok(Self::Sctp)
        } else {
            Err(UnknownProtocolError(s.to_owned()))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown port protocol `{0}`, only `tcp`, `udp`, and `sctp` are supported")]
pub struct UnknownProtocolError(String);
