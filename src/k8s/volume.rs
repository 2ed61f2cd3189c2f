//! Utilities for converting Docker [`Mount`]s into Kubernetes [`Volume`]s and [`VolumeMount`]s
//! for a [`PodSpec`](k8s_openapi::api::core::v1::PodSpec) and its
//! [`Container`](k8s_openapi::api::core::v1::Container).

use std::collections::HashSet;

use k8s_openapi::api::core::v1::{
    EmptyDirVolumeSource, HostPathVolumeSource, PersistentVolumeClaimVolumeSource, Volume,
    VolumeMount,
};

use crate::container::{Mount, MountKind};

use super::name::ResourceName;

/// Pod [`Volume`]s and the container [`VolumeMount`]s which reference them by name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VolumeSet {
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
}

/// Convert [`Mount`]s into a [`VolumeSet`].
///
/// Each mount becomes one [`Volume`] and one [`VolumeMount`] with a unique name:
///
/// - bind mounts become a `hostPath` volume,
/// - named Docker volumes become a `persistentVolumeClaim` volume whose claim must be created
///   separately,
/// - anonymous Docker volumes and tmpfs mounts become an `emptyDir` volume.
///
/// Bind mounts without a source path are skipped.
pub fn build_volumes(mounts: &[Mount]) -> VolumeSet {
    let mut taken = HashSet::new();
    let mut set = VolumeSet::default();

    for (index, mount) in mounts.iter().enumerate() {
        let Some(source) = Source::from_mount(mount) else {
            tracing::warn!(
                destination = %mount.destination,
                "skipping bind mount without a source path"
            );
            continue;
        };

        let name = unique_name(source.volume_name(mount, index), &mut taken);

        set.volume_mounts.push(VolumeMount {
            mount_path: mount.destination.clone(),
            name: name.to_string(),
            read_only: mount.read_only.then_some(true),
            ..VolumeMount::default()
        });
        set.volumes.push(source.into_volume(name.into()));
    }

    set
}

/// Where the data of a [`Volume`] comes from.
enum Source {
    HostPath(String),
    Claim(ResourceName),
    EmptyDir { memory: bool },
}

impl Source {
    fn from_mount(mount: &Mount) -> Option<Self> {
        match mount.kind {
            MountKind::Bind => mount
                .source
                .as_ref()
                .filter(|source| !source.is_empty())
                .map(|source| Self::HostPath(source.clone())),
            MountKind::Volume => Some(
                mount
                    .name
                    .as_deref()
                    .filter(|name| !is_anonymous(name))
                    .and_then(ResourceName::try_sanitize)
                    .map_or(Self::EmptyDir { memory: false }, Self::Claim),
            ),
            MountKind::Tmpfs => Some(Self::EmptyDir { memory: true }),
        }
    }

    /// Name for the [`Volume`] before making it unique.
    ///
    /// Claims are named after the claim, everything else after the mount destination.
    /// Falls back to `vol-{index}`.
    fn volume_name(&self, mount: &Mount, index: usize) -> ResourceName {
        match self {
            Self::Claim(claim) => claim.clone(),
            Self::HostPath(_) | Self::EmptyDir { .. } => {
                ResourceName::try_sanitize(&mount.destination)
                    .unwrap_or_else(|| ResourceName::sanitize(&format!("vol-{index}")))
            }
        }
    }

    fn into_volume(self, name: String) -> Volume {
        match self {
            Self::HostPath(path) => Volume {
                name,
                host_path: Some(HostPathVolumeSource { path, type_: None }),
                ..Volume::default()
            },
            Self::Claim(claim) => Volume {
                name,
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.into(),
                    read_only: None,
                }),
                ..Volume::default()
            },
            Self::EmptyDir { memory } => Volume {
                name,
                empty_dir: Some(EmptyDirVolumeSource {
                    medium: memory.then(|| "Memory".to_owned()),
                    size_limit: None,
                }),
                ..Volume::default()
            },
        }
    }
}

/// Docker names anonymous volumes with 64 hex characters.
fn is_anonymous(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// Return `name`, or `name` with the first free `-{n}` suffix, and mark it as taken.
fn unique_name(name: ResourceName, taken: &mut HashSet<ResourceName>) -> ResourceName {
    if taken.insert(name.clone()) {
        return name;
    }
    let mut n = 2_u32;
    loop {
        let candidate = name.with_suffix(n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn mount(kind: MountKind, source: Option<&str>, destination: &str) -> Mount {
        Mount {
            kind,
            source: source.map(ToOwned::to_owned),
            destination: destination.to_owned(),
            name: None,
            read_only: false,
        }
    }

    fn named(name: &str, destination: &str) -> Mount {
        Mount {
            name: Some(name.to_owned()),
            ..mount(MountKind::Volume, None, destination)
        }
    }

    #[test]
    fn bind_mount() {
        let VolumeSet {
            volumes,
            volume_mounts,
        } = build_volumes(&[Mount {
            read_only: true,
            ..mount(MountKind::Bind, Some("/srv/nginx/conf"), "/etc/nginx/conf.d")
        }]);

        assert_eq!(
            volume_mounts,
            [VolumeMount {
                mount_path: "/etc/nginx/conf.d".to_owned(),
                name: "etc-nginx-conf-d".to_owned(),
                read_only: Some(true),
                ..VolumeMount::default()
            }],
        );
        assert_eq!(
            volumes,
            [Volume {
                name: "etc-nginx-conf-d".to_owned(),
                host_path: Some(HostPathVolumeSource {
                    path: "/srv/nginx/conf".to_owned(),
                    type_: None,
                }),
                ..Volume::default()
            }],
        );
    }

    #[test]
    fn named_volume_is_claim_placeholder() {
        let set = build_volumes(&[named("pg_data", "/var/lib/postgresql/data")]);

        assert_eq!(set.volume_mounts.first().unwrap().name, "pg-data");
        let volume = set.volumes.first().unwrap();
        assert_eq!(volume.name, "pg-data");
        assert_eq!(
            volume.persistent_volume_claim,
            Some(PersistentVolumeClaimVolumeSource {
                claim_name: "pg-data".to_owned(),
                read_only: None,
            }),
        );
    }

    #[test]
    fn anonymous_volume_and_tmpfs_are_empty_dirs() {
        let set = build_volumes(&[
            named(&"ab12".repeat(16), "/cache"),
            mount(MountKind::Tmpfs, None, "/run"),
        ]);

        let [cache, run] = set.volumes.as_slice() else {
            panic!("expected two volumes: {set:?}");
        };
        assert_eq!(cache.name, "cache");
        assert_eq!(cache.empty_dir, Some(EmptyDirVolumeSource::default()));
        assert_eq!(run.name, "run");
        assert_eq!(
            run.empty_dir.as_ref().and_then(|dir| dir.medium.as_deref()),
            Some("Memory"),
        );
    }

    #[test]
    fn collisions_get_suffix() {
        let set = build_volumes(&[
            named("data", "/a"),
            named("data", "/b"),
            mount(MountKind::Bind, Some("/host/data"), "/data"),
        ]);

        let names: Vec<_> = set.volumes.iter().map(|volume| volume.name.as_str()).collect();
        assert_eq!(names, ["data", "data-2", "data-3"]);

        let mount_names: Vec<_> = set
            .volume_mounts
            .iter()
            .map(|mount| mount.name.as_str())
            .collect();
        assert_eq!(mount_names, names);

        // both mounts of the same docker volume share a claim
        let claim = set
            .volumes
            .get(1)
            .and_then(|volume| volume.persistent_volume_claim.as_ref())
            .map(|claim| claim.claim_name.as_str());
        assert_eq!(claim, Some("data"));
    }

    #[test]
    fn root_destination_falls_back_to_index() {
        let set = build_volumes(&[
            mount(MountKind::Bind, Some("/a"), "/x"),
            mount(MountKind::Bind, Some("/b"), "/"),
        ]);
        assert_eq!(set.volumes.get(1).unwrap().name, "vol-1");
    }

    #[test]
    fn bind_without_source_skipped() {
        let set = build_volumes(&[mount(MountKind::Bind, None, "/data")]);
        assert_eq!(set, VolumeSet::default());
    }
}
