mod connection;
mod export;

use std::{iter, path::PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::{
    Help,
    eyre::{WrapErr, eyre},
};

use crate::{
    config::{self, ConfigFile, PortainerSettings},
    wizard::Wizard,
};

use self::{connection::PortainerArgs, export::Export};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the settings file
    ///
    /// Created by the `tui` command. Options given on the command line or through the
    /// environment take precedence over the settings in the file.
    #[arg(
        long,
        global = true,
        env = "PORTAINER_TO_K8S_CONFIG",
        value_name = "PATH",
        default_value = config::DEFAULT_PATH
    )]
    config: PathBuf,

    /// Log more details to stderr
    ///
    /// Can be specified multiple times: `-v` for info, `-vv` for debug, and `-vvv` for trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Number of times `--verbose` was given.
    pub const fn verbosity(&self) -> u8 {
        self.verbose
    }

    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn run(self) -> color_eyre::Result<()> {
        let config = ConfigFile::new(self.config);

        match self.command {
            Commands::Export(export) => export.run(&config),
            Commands::Endpoints { portainer } => {
                let settings = config.load()?;
                let client =
                    portainer.connect(settings.as_ref().map(|settings| &settings.portainer))?;
                let rows: Vec<_> = client
                    .endpoints()
                    .wrap_err("error listing endpoints")?
                    .into_iter()
                    .map(|endpoint| [endpoint.id.to_string(), endpoint.name])
                    .collect();
                print!("{}", table(["ID", "NAME"], &rows));
                Ok(())
            }
            Commands::Containers {
                portainer,
                endpoint,
            } => {
                let settings = config.load()?;
                let settings = settings.as_ref().map(|settings| &settings.portainer);
                let endpoint = endpoint_id(endpoint, settings)?;
                let client = portainer.connect(settings)?;
                let rows: Vec<_> = client
                    .containers(endpoint)
                    .wrap_err_with(|| format!("error listing containers on endpoint {endpoint}"))?
                    .into_iter()
                    .map(|container| {
                        [
                            container.display_name().to_owned(),
                            container.short_id().to_owned(),
                            container.state,
                            container.image,
                        ]
                    })
                    .collect();
                print!("{}", table(["NAME", "SHORT-ID", "STATE", "IMAGE"], &rows));
                Ok(())
            }
            Commands::Tui => Wizard::new(config).run(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Convert a container into a Kubernetes Deployment and Service
    ///
    /// The manifest is printed to stdout unless `--file` is used.
    #[command(visible_alias = "cli")]
    Export(Export),

    /// List the Docker endpoints (environments) of the Portainer instance
    Endpoints {
        #[command(flatten)]
        portainer: PortainerArgs,
    },

    /// List all containers on a Docker endpoint, including stopped ones
    Containers {
        #[command(flatten)]
        portainer: PortainerArgs,

        /// ID of the Docker endpoint (environment)
        #[arg(long, env = "PORTAINER_ENDPOINT", value_name = "ID")]
        endpoint: Option<u32>,
    },

    /// Interactively select a container and convert it
    ///
    /// Connection settings are saved to the settings file for the next run.
    #[command(visible_alias = "wizard")]
    Tui,
}

/// The endpoint given on the command line, or else the one in `settings`.
fn endpoint_id(
    endpoint: Option<u32>,
    settings: Option<&PortainerSettings>,
) -> color_eyre::Result<u32> {
    endpoint
        .or_else(|| settings.and_then(|settings| settings.endpoint_id))
        .ok_or_else(|| eyre!("Portainer endpoint not set"))
        .suggestion(
            "Use `--endpoint` or set `PORTAINER_ENDPOINT`. \
                Use the `endpoints` command to list the available endpoints.",
        )
}

/// Format `rows` into left aligned columns under `header`.
fn table<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = header.map(str::to_owned);
    iter::once(&header)
        .chain(rows)
        .map(|row| {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            format!("{}\n", line.trim_end())
        })
        .collect()
}
