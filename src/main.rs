//! portainer-to-k8s converts a Docker container managed by [Portainer](https://www.portainer.io/)
//! into a Kubernetes `Deployment` and `Service`.
//!
//! # Usage
//!
//! ```shell
//! $ portainer-to-k8s export --url https://portainer.local:9443 --endpoint 2 --container web
//! apiVersion: apps/v1
//! kind: Deployment
//! metadata:
//!   labels:
//!     app: web
//!   name: web
//!   namespace: default
//! ...
//! ```
//!
//! Run `portainer-to-k8s tui` for an interactive wizard, or `portainer-to-k8s --help` for more
//! information.

mod cli;
mod config;
mod container;
mod k8s;
mod logging;
mod output;
mod portainer;
mod wizard;

use clap::Parser;

use self::cli::Cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbosity());

    cli.run()
}
