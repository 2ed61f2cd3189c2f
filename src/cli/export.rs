use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::WrapErr;

use crate::{
    config::ConfigFile,
    k8s::{self, ExportConfig, name::ResourceName},
    output,
};

use super::{PortainerArgs, endpoint_id};

/// Options for the `export` command.
#[allow(clippy::option_option)]
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Export {
    #[command(flatten)]
    portainer: PortainerArgs,

    /// ID of the Docker endpoint (environment) the container is on
    ///
    /// Use the `endpoints` command to list the available endpoints.
    #[arg(long, env = "PORTAINER_ENDPOINT", value_name = "ID")]
    endpoint: Option<u32>,

    /// ID prefix or name of the container to convert
    #[arg(long, value_name = "ID|NAME")]
    container: String,

    /// Namespace of the generated resources
    ///
    /// Must be a valid Kubernetes name.
    #[arg(long, default_value_t = ResourceName::default_namespace())]
    namespace: ResourceName,

    /// Write the manifest to a file instead of printing to stdout
    ///
    /// Optionally provide a path for the file.
    /// If no path, or a directory, is given, the file is named `{name}-manifest.yaml`
    /// after the generated resources.
    #[arg(short, long, value_name = "PATH")]
    file: Option<Option<PathBuf>>,

    /// Overwrite an existing file
    #[arg(long, requires = "file")]
    overwrite: bool,
}

impl Export {
    /// Fetch the container from Portainer and print or write its manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file is invalid, the container could not be fetched or
    /// converted, or the manifest could not be written.
    pub fn run(self, config: &ConfigFile) -> color_eyre::Result<()> {
        let Self {
            portainer,
            endpoint,
            container,
            namespace,
            file,
            overwrite,
        } = self;

        let settings = config.load()?;
        let settings = settings.as_ref().map(|settings| &settings.portainer);
        let endpoint = endpoint_id(endpoint, settings)?;
        let client = portainer.connect(settings)?;

        let id = client.resolve_container_id(endpoint, &container)?;
        let spec = client.inspect_container(endpoint, &id)?;
        let manifest = k8s::build_documents(
            &spec,
            &ExportConfig {
                namespace,
                container_ref: container,
            },
        )
        .wrap_err_with(|| format!("error converting container `{}`", spec.name))?;
        let yaml = manifest
            .to_yaml()
            .wrap_err("error serializing manifest")?;

        match file {
            Some(path) => {
                let file_name = output::default_file_name(&manifest.name);
                let path = match path {
                    Some(path) if path.is_dir() => path.join(file_name),
                    Some(path) => path,
                    None => file_name,
                };
                output::write_file(&path, &yaml, overwrite)?;
                println!("Wrote to file: {}", path.display());
            }
            None => print!("{yaml}"),
        }

        Ok(())
    }
}
