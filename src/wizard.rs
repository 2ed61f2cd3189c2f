//! Interactive terminal front end, see [`Wizard`].

mod state;

use std::{
    fmt::{self, Display, Formatter},
    io::{self, IsTerminal},
    path::PathBuf,
};

use color_eyre::{
    Help,
    eyre::{WrapErr, bail, eyre},
};
use inquire::{
    Confirm, CustomUserError, InquireError, Password, PasswordDisplayMode, Select, Text,
    validator::Validation,
};
use url::Url;

use crate::{
    config::{AuthMethod, AuthSettings, ConfigFile, PortainerSettings, Settings},
    container::ContainerSpec,
    k8s::{self, ExportConfig, Manifest, name::ResourceName},
    output,
    portainer::{Client, ContainerSummary, Credentials},
};

use self::state::{Event, State};

/// Result of a prompt.
#[derive(Debug)]
enum Answer<T> {
    Value(T),
    /// The prompt was cancelled with Esc.
    Back,
    /// The prompt was interrupted with Ctrl-C.
    Quit,
}

/// Convert the result of an [`inquire`] prompt into an [`Answer`].
fn answer<T>(result: Result<T, InquireError>) -> color_eyre::Result<Answer<T>> {
    match result {
        Ok(value) => Ok(Answer::Value(value)),
        Err(InquireError::OperationCanceled) => Ok(Answer::Back),
        Err(InquireError::OperationInterrupted) => Ok(Answer::Quit),
        Err(error) => Err(error).wrap_err("error reading input"),
    }
}

/// Values a function may return early with when a prompt is cancelled or interrupted.
trait Interrupt {
    fn back() -> Self;
    fn quit() -> Self;
}

impl Interrupt for Event {
    fn back() -> Self {
        Self::Back
    }

    fn quit() -> Self {
        Self::Quit
    }
}

impl<T> Interrupt for Answer<T> {
    fn back() -> Self {
        Self::Back
    }

    fn quit() -> Self {
        Self::Quit
    }
}

/// Unwrap the value of a `color_eyre::Result<Answer<T>>`.
///
/// Returns early with [`Interrupt::back()`] or [`Interrupt::quit()`] if there is no value.
macro_rules! ask {
    ($answer:expr) => {
        match $answer? {
            Answer::Value(value) => value,
            Answer::Back => return Ok(Interrupt::back()),
            Answer::Quit => return Ok(Interrupt::quit()),
        }
    };
}

/// A connection to Portainer and the settings used to make it.
#[derive(Debug)]
struct Session {
    client: Client,
    settings: PortainerSettings,
}

impl Session {
    fn endpoint(&self) -> color_eyre::Result<u32> {
        self.settings
            .endpoint_id
            .ok_or_else(|| eyre!("no endpoint selected"))
    }
}

/// Step by step conversion of a container, driven by the transitions of [`State`].
///
/// Esc goes back a step, Ctrl-C quits.
#[derive(Debug)]
pub struct Wizard {
    config: ConfigFile,
    session: Option<Session>,
    container: Option<ContainerSummary>,
    namespace: ResourceName,
    manifest: Option<Manifest>,
}

impl Wizard {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config,
            session: None,
            container: None,
            namespace: ResourceName::default_namespace(),
            manifest: None,
        }
    }

    /// Run until the user quits.
    ///
    /// When a step fails, the error is shown and the user may try the step again.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin is not a terminal or reading input fails.
    pub fn run(mut self) -> color_eyre::Result<()> {
        if !io::stdin().is_terminal() {
            return Err(eyre!("the wizard requires an interactive terminal"))
                .suggestion("Use the `export` command in scripts.");
        }

        println!("Portainer to Kubernetes: press Esc to go back, Ctrl-C to quit.\n");

        let mut state = State::Connect;
        while state != State::Exit {
            let event = match self.step(state) {
                Ok(event) => event,
                Err(error) if is_input_error(&error) => return Err(error),
                Err(error) => {
                    eprintln!("\n{error:?}\n");
                    match answer(Confirm::new("Try again?").with_default(true).prompt())? {
                        Answer::Value(true) => Event::Retry,
                        Answer::Value(false) | Answer::Back => Event::Back,
                        Answer::Quit => Event::Quit,
                    }
                }
            };
            let next = state.next(event);
            tracing::debug!(?state, ?event, ?next, "wizard transition");
            state = next;
        }

        Ok(())
    }

    fn step(&mut self, state: State) -> color_eyre::Result<Event> {
        match state {
            State::Connect => self.connect(),
            State::SelectEndpoint => self.select_endpoint(),
            State::SelectContainer => self.select_container(),
            State::Configure => self.configure(),
            State::Preview => self.preview(),
            State::Exit => Ok(Event::Quit),
        }
    }

    fn connect(&mut self) -> color_eyre::Result<Event> {
        self.session = None;
        let mut saved = self.load_settings().map(|settings| settings.portainer);
        let mut defaults = None;

        if let Some(settings) = &saved {
            println!("Saved connection: {}", settings.url);
            let choice = ask!(answer(
                Select::new("Portainer connection:", SavedChoice::ALL.to_vec()).prompt()
            ));
            if choice == SavedChoice::Reconfigure {
                if self.config.exists() {
                    self.config.delete()?;
                    println!("Removed {}", self.config.path().display());
                }
                defaults = saved.take();
            }
        }

        let (settings, credentials) = match saved {
            Some(settings) => {
                let (auth, credentials) = ask!(saved_credentials(&settings.auth));
                (PortainerSettings { auth, ..settings }, credentials)
            }
            None => ask!(prompt_connection(defaults.as_ref())),
        };

        println!("Connecting to {}", settings.url);
        let client = Client::connect(settings.url.clone(), &credentials, settings.insecure)
            .wrap_err_with(|| format!("error connecting to Portainer at {}", settings.url))?;

        let event = if settings.endpoint_id.is_some() {
            Event::Connected
        } else {
            Event::EndpointRequired
        };
        self.session = Some(Session { client, settings });
        Ok(event)
    }

    /// Saved settings, or [`None`] if there are none or they could not be loaded.
    fn load_settings(&self) -> Option<Settings> {
        self.config.load().unwrap_or_else(|error| {
            eprintln!("{error:?}\n");
            None
        })
    }

    fn select_endpoint(&mut self) -> color_eyre::Result<Event> {
        let session = self.session.as_mut().ok_or_else(not_connected)?;
        let endpoints = session
            .client
            .endpoints()
            .wrap_err("error listing endpoints")?;
        if endpoints.is_empty() {
            bail!("no endpoints found on {}", session.client.base_url());
        }

        let cursor = session
            .settings
            .endpoint_id
            .and_then(|id| endpoints.iter().position(|endpoint| endpoint.id == id))
            .unwrap_or_default();
        let endpoint = ask!(answer(
            Select::new("Docker endpoint:", endpoints)
                .with_starting_cursor(cursor)
                .prompt()
        ));

        session.settings.endpoint_id = Some(endpoint.id);
        let settings = Settings {
            portainer: session.settings.clone(),
        };
        match self.config.save(&settings) {
            Ok(()) => println!("Settings saved to {}", self.config.path().display()),
            Err(error) => {
                let error = format!("{error:#}");
                tracing::warn!(%error, "settings not saved");
            }
        }

        Ok(Event::EndpointSelected)
    }

    fn select_container(&mut self) -> color_eyre::Result<Event> {
        let session = self.session.as_ref().ok_or_else(not_connected)?;
        let endpoint = session.endpoint()?;
        let containers = session
            .client
            .containers(endpoint)
            .wrap_err_with(|| format!("error listing containers on endpoint {endpoint}"))?;
        if containers.is_empty() {
            return Err(eyre!("no containers found on endpoint {endpoint}"))
                .suggestion("Go back to select another endpoint.");
        }

        let cursor = self
            .container
            .as_ref()
            .and_then(|selected| containers.iter().position(|c| c.id == selected.id))
            .unwrap_or_default();
        let message = format!("Container on endpoint {endpoint}:");
        let container = ask!(answer(
            Select::new(&message, containers)
                .with_starting_cursor(cursor)
                .with_page_size(15)
                .prompt()
        ));

        self.container = Some(container);
        Ok(Event::ContainerSelected)
    }

    fn configure(&mut self) -> color_eyre::Result<Event> {
        let session = self.session.as_ref().ok_or_else(not_connected)?;
        let container = self
            .container
            .as_ref()
            .ok_or_else(|| eyre!("no container selected"))?;
        let spec = session
            .client
            .inspect_container(session.endpoint()?, &container.id)?;

        print_summary(&spec);

        let default = self.namespace.to_string();
        let namespace = ask!(answer(
            Text::new("Namespace:")
                .with_default(&default)
                .with_validator(validate_name)
                .prompt()
        ));
        let namespace: ResourceName = namespace.trim().parse()?;

        let manifest = k8s::build_documents(
            &spec,
            &ExportConfig {
                namespace: namespace.clone(),
                container_ref: container.display_name().to_owned(),
            },
        )
        .wrap_err_with(|| format!("error converting container `{}`", container.display_name()))?;

        self.namespace = namespace;
        self.manifest = Some(manifest);
        Ok(Event::Generated)
    }

    fn preview(&mut self) -> color_eyre::Result<Event> {
        let manifest = self
            .manifest
            .as_ref()
            .ok_or_else(|| eyre!("no manifest generated"))?;
        let yaml = manifest.to_yaml().wrap_err("error serializing manifest")?;
        println!("\n{yaml}");

        loop {
            match ask!(answer(
                Select::new("Manifest:", PreviewAction::ALL.to_vec()).prompt()
            )) {
                PreviewAction::Save => {
                    let default = output::default_file_name(&manifest.name);
                    let default = default.to_string_lossy();
                    let path = ask!(answer(
                        Text::new("File:")
                            .with_default(&default)
                            .with_validator(validate_not_empty)
                            .prompt()
                    ));
                    let path = PathBuf::from(path.trim());

                    let overwrite = path.exists();
                    if overwrite {
                        let message = format!("{} already exists, overwrite it?", path.display());
                        if !ask!(answer(Confirm::new(&message).with_default(false).prompt())) {
                            continue;
                        }
                    }

                    output::write_file(&path, &yaml, overwrite)?;
                    println!("Wrote to file: {}", path.display());
                }
                PreviewAction::Copy => {
                    let program = output::copy_to_clipboard(&yaml)?;
                    println!("Copied to clipboard with `{program}`");
                }
                PreviewAction::Back => return Ok(Event::Back),
                PreviewAction::Quit => return Ok(Event::Quit),
            }
        }
    }
}

fn not_connected() -> color_eyre::Report {
    eyre!("not connected to Portainer")
}

/// Whether the error came from reading input, which retrying will not fix.
fn is_input_error(error: &color_eyre::Report) -> bool {
    error.chain().any(|cause| cause.is::<InquireError>())
}

/// Credentials for the saved `auth` settings.
///
/// Only asks for what is not saved, usually the password.
fn saved_credentials(
    auth: &AuthSettings,
) -> color_eyre::Result<Answer<(AuthSettings, Credentials)>> {
    match (auth.method(), &auth.api_key, &auth.username) {
        (Some(AuthMethod::ApiKey), Some(api_key), _) => Ok(Answer::Value((
            auth.clone(),
            Credentials::ApiKey(api_key.clone()),
        ))),
        (Some(AuthMethod::UsernamePassword), _, Some(username)) => {
            let message = format!("Password for {username}:");
            let password = ask!(answer(
                Password::new(&message).without_confirmation().prompt()
            ));
            Ok(Answer::Value((
                auth.clone(),
                Credentials::Password {
                    username: username.clone(),
                    password,
                },
            )))
        }
        _ => prompt_auth(Some(auth)),
    }
}

/// Ask for all connection settings, starting from `defaults`.
fn prompt_connection(
    defaults: Option<&PortainerSettings>,
) -> color_eyre::Result<Answer<(PortainerSettings, Credentials)>> {
    let default_url = defaults.map(|settings| settings.url.to_string());
    let mut url = Text::new("Portainer URL:")
        .with_placeholder("https://portainer.local:9443")
        .with_validator(validate_url);
    if let Some(default) = &default_url {
        url = url.with_default(default);
    }
    let url = ask!(answer(url.prompt()));
    let url = parse_url(&url).map_err(|message| eyre!(message))?;

    let insecure = url.scheme() == "https"
        && ask!(answer(
            Confirm::new("Accept invalid TLS certificates, e.g. self-signed ones?")
                .with_default(defaults.is_some_and(|settings| settings.insecure))
                .prompt()
        ));

    let (auth, credentials) = ask!(prompt_auth(defaults.map(|settings| &settings.auth)));

    Ok(Answer::Value((
        PortainerSettings {
            url,
            endpoint_id: None,
            insecure,
            auth,
        },
        credentials,
    )))
}

/// Ask for an authentication method and its credentials.
fn prompt_auth(
    defaults: Option<&AuthSettings>,
) -> color_eyre::Result<Answer<(AuthSettings, Credentials)>> {
    const METHODS: [AuthMethod; 2] = [AuthMethod::ApiKey, AuthMethod::UsernamePassword];

    let cursor = defaults
        .and_then(AuthSettings::method)
        .and_then(|method| METHODS.iter().position(|m| *m == method))
        .unwrap_or_default();
    let method = ask!(answer(
        Select::new("Authentication method:", METHODS.to_vec())
            .with_starting_cursor(cursor)
            .prompt()
    ));

    match method {
        AuthMethod::ApiKey => {
            let api_key = ask!(answer(
                Password::new("API key:")
                    .without_confirmation()
                    .with_display_mode(PasswordDisplayMode::Masked)
                    .with_validator(validate_not_empty)
                    .prompt()
            ));
            let auth = AuthSettings {
                method: Some(method),
                api_key: Some(api_key.clone()),
                username: None,
            };
            Ok(Answer::Value((auth, Credentials::ApiKey(api_key))))
        }
        AuthMethod::UsernamePassword => {
            let default_username = defaults.and_then(|auth| auth.username.as_deref());
            let mut username = Text::new("Username:").with_validator(validate_not_empty);
            if let Some(default) = default_username {
                username = username.with_default(default);
            }
            let username = ask!(answer(username.prompt()));
            let password = ask!(answer(
                Password::new("Password:").without_confirmation().prompt()
            ));
            let auth = AuthSettings {
                method: Some(method),
                api_key: None,
                username: Some(username.clone()),
            };
            Ok(Answer::Value((auth, Credentials::Password { username, password })))
        }
    }
}

fn print_summary(spec: &ContainerSpec) {
    let command: Vec<&str> = spec
        .entrypoint
        .iter()
        .chain(&spec.command)
        .flatten()
        .map(String::as_str)
        .collect();
    let command = if command.is_empty() {
        "(image default)".to_owned()
    } else {
        shlex::try_join(command.iter().copied()).unwrap_or_else(|_| command.join(" "))
    };

    println!();
    println!("Container: {} ({})", spec.name.trim_start_matches('/'), spec.short_id());
    println!("Image:     {}", spec.image);
    println!("Command:   {command}");
    println!(
        "Env: {}, mounts: {}, ports: {}",
        spec.env.len(),
        spec.mounts.len(),
        spec.ports.len(),
    );
    println!();
}

/// Parse a Portainer URL, which must use HTTP(S).
fn parse_url(input: &str) -> Result<Url, String> {
    let url = Url::parse(input.trim()).map_err(|error| format!("invalid URL: {error}"))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err("URL must start with http:// or https://".to_owned())
    }
}

#[allow(clippy::unnecessary_wraps)]
fn validate_url(input: &str) -> Result<Validation, CustomUserError> {
    Ok(match parse_url(input) {
        Ok(_) => Validation::Valid,
        Err(message) => Validation::Invalid(message.into()),
    })
}

#[allow(clippy::unnecessary_wraps)]
fn validate_name(input: &str) -> Result<Validation, CustomUserError> {
    Ok(match input.trim().parse::<ResourceName>() {
        Ok(_) => Validation::Valid,
        Err(error) => Validation::Invalid(error.to_string().into()),
    })
}

#[allow(clippy::unnecessary_wraps)]
fn validate_not_empty(input: &str) -> Result<Validation, CustomUserError> {
    Ok(if input.trim().is_empty() {
        Validation::Invalid("A value is required".into())
    } else {
        Validation::Valid
    })
}

/// Choices when saved settings exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SavedChoice {
    Use,
    Reconfigure,
}

impl SavedChoice {
    const ALL: [Self; 2] = [Self::Use, Self::Reconfigure];
}

impl Display for SavedChoice {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Use => "Use saved settings",
            Self::Reconfigure => "Reconfigure",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreviewAction {
    Save,
    Copy,
    Back,
    Quit,
}

impl PreviewAction {
    const ALL: [Self; 4] = [Self::Save, Self::Copy, Self::Back, Self::Quit];
}

impl Display for PreviewAction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "Save to file",
            Self::Copy => "Copy to clipboard",
            Self::Back => "Back",
            Self::Quit => "Quit",
        })
    }
}
