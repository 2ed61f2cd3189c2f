use clap::Args;
use color_eyre::{
    Help,
    eyre::{WrapErr, eyre},
};
use url::Url;

use crate::{
    config::{AuthMethod, AuthSettings, PortainerSettings},
    portainer::{Client, Credentials},
};

/// Options for connecting to Portainer.
///
/// Each option defaults to the value in the settings file.
#[derive(Args, Default, Debug, Clone, PartialEq, Eq)]
#[command(next_help_heading = "Portainer Options")]
pub struct PortainerArgs {
    /// Base URL of the Portainer instance
    ///
    /// Must start with `http://` or `https://`, e.g. `https://portainer.local:9443`.
    #[arg(long, env = "PORTAINER_URL", value_name = "URL")]
    url: Option<Url>,

    /// Portainer access token, sent in the `X-API-Key` header
    ///
    /// Takes precedence over `--username`.
    #[arg(long, env = "PORTAINER_API_KEY", hide_env_values = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Portainer username
    ///
    /// Requires `--password`.
    #[arg(long, env = "PORTAINER_USERNAME")]
    username: Option<String>,

    /// Portainer password
    #[arg(long, env = "PORTAINER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Accept invalid TLS certificates, e.g. self-signed ones
    #[arg(long)]
    insecure: bool,
}

impl PortainerArgs {
    /// Connect to Portainer, filling in missing options from `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or credentials are not set, or connecting fails.
    pub fn connect(&self, settings: Option<&PortainerSettings>) -> color_eyre::Result<Client> {
        let url = self
            .url
            .as_ref()
            .or_else(|| settings.map(|settings| &settings.url))
            .ok_or_else(|| eyre!("Portainer URL not set"))
            .suggestion(
                "Use `--url` or set `PORTAINER_URL`. \
                    Alternatively, run the `tui` command to create a settings file.",
            )?;
        let insecure = self.insecure || settings.is_some_and(|settings| settings.insecure);
        let credentials = self.credentials(settings.map(|settings| &settings.auth))?;

        Client::connect(url.clone(), &credentials, insecure)
            .wrap_err_with(|| format!("error connecting to Portainer at {url}"))
    }

    fn credentials(&self, auth: Option<&AuthSettings>) -> color_eyre::Result<Credentials> {
        if let Some(api_key) = &self.api_key {
            return Ok(Credentials::ApiKey(api_key.clone()));
        }
        if let Some(username) = &self.username {
            return self.password_for(username);
        }

        let missing = || {
            eyre!("Portainer credentials not set").suggestion(
                "Use `--api-key`, or `--username` and `--password`. \
                    The `PORTAINER_API_KEY`, `PORTAINER_USERNAME`, and `PORTAINER_PASSWORD` \
                    environment variables may also be used.",
            )
        };

        let auth = auth.ok_or_else(missing)?;
        match auth.method().ok_or_else(missing)? {
            AuthMethod::ApiKey => auth
                .api_key
                .clone()
                .map(Credentials::ApiKey)
                .ok_or_else(missing),
            AuthMethod::UsernamePassword => {
                let username = auth.username.as_deref().ok_or_else(missing)?;
                self.password_for(username)
            }
        }
    }

    fn password_for(&self, username: &str) -> color_eyre::Result<Credentials> {
        let password = self
            .password
            .clone()
            .ok_or_else(|| eyre!("a password is required to log in as `{username}`"))
            .suggestion("Use `--password` or set `PORTAINER_PASSWORD`.")?;

        Ok(Credentials::Password {
            username: username.to_owned(),
            password,
        })
    }
}
