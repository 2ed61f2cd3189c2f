//! Blocking client for the [Portainer](https://www.portainer.io/) HTTP API.
//!
//! Only the calls needed to find a container on a Docker endpoint and read its configuration are
//! supported. See [`Client`].

mod inspect;

use std::{
    fmt::{self, Debug, Display, Formatter},
    iter,
    time::Duration,
};

use reqwest::{
    StatusCode,
    blocking::{Client as HttpClient, Response},
    header::{AUTHORIZATION, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use url::Url;

use crate::container::{ContainerSpec, MalformedContainerError};

use self::inspect::ContainerInspect;

/// Timeout for every request sent to Portainer.
const TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Page size used when listing endpoints.
const ENDPOINT_LIMIT: (&str, &str) = ("limit", "100");

/// How to authenticate with Portainer.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Access token, sent with every request in the `X-API-Key` header.
    ApiKey(String),

    /// Exchanged for a JWT through `POST /api/auth`.
    Password { username: String, password: String },
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"<redacted>").finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// An authenticated connection to a Portainer instance.
#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    base_url: Url,
    auth: (HeaderName, HeaderValue),
}

impl Client {
    /// Connect to the Portainer instance at `base_url`.
    ///
    /// Logs in first when authenticating with a username and password.
    /// If `insecure` is `true`, invalid TLS certificates are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an HTTP(S) URL, the HTTP client could not be built,
    /// or logging in fails.
    pub fn connect(base_url: Url, credentials: &Credentials, insecure: bool) -> Result<Self, Error> {
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Scheme(base_url));
        }

        let http = HttpClient::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Self::with_http(http, base_url, credentials)
    }

    fn with_http(http: HttpClient, base_url: Url, credentials: &Credentials) -> Result<Self, Error> {
        let auth = match credentials {
            Credentials::ApiKey(key) => (
                HeaderName::from_static("x-api-key"),
                sensitive_header(key)?,
            ),
            Credentials::Password { username, password } => {
                let jwt = login(&http, &base_url, username, password)?;
                (AUTHORIZATION, sensitive_header(&format!("Bearer {jwt}"))?)
            }
        };

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    /// The URL of the Portainer instance.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the endpoints (environments) visible to the authenticated user.
    ///
    /// Newer Portainer versions renamed endpoints to environments, `/api/environments` is used if
    /// `/api/endpoints` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or the response could not be decoded.
    pub fn endpoints(&self) -> Result<Vec<EndpointSummary>, Error> {
        let response = self.get("api/endpoints", &[ENDPOINT_LIMIT])?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("`api/endpoints` not found, falling back to `api/environments`");
            let path = "api/environments";
            return decode(path, self.get(path, &[ENDPOINT_LIMIT])?);
        }
        decode("api/endpoints", response)
    }

    /// List all containers on the Docker `endpoint`, including stopped ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response could not be decoded.
    pub fn containers(&self, endpoint: u32) -> Result<Vec<ContainerSummary>, Error> {
        let path = format!("api/endpoints/{endpoint}/docker/containers/json");
        decode(&path, self.get(&path, &[("all", "true")])?)
    }

    /// Find the full ID of the container on `endpoint` referenced by `reference`, an ID prefix or
    /// a name.
    ///
    /// # Errors
    ///
    /// Returns an error if listing the containers fails, or if no container or more than one
    /// container matches.
    pub fn resolve_container_id(&self, endpoint: u32, reference: &str) -> Result<String, Error> {
        let containers = self.containers(endpoint)?;
        let id = resolve(&containers, endpoint, reference)?;
        tracing::info!(reference, id, "resolved container");
        Ok(id.to_owned())
    }

    /// Inspect the container with `id` on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, or the response could not be decoded into a
    /// [`ContainerSpec`].
    pub fn inspect_container(&self, endpoint: u32, id: &str) -> Result<ContainerSpec, Error> {
        let path = format!("api/endpoints/{endpoint}/docker/containers/{id}/json");
        let inspect: ContainerInspect = decode(&path, self.get(&path, &[])?)?;
        let spec = ContainerSpec::try_from(inspect)?;
        tracing::info!(
            container = %spec.name,
            id = spec.short_id(),
            image = %spec.image,
            "inspected container"
        );
        Ok(spec)
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, Error> {
        let url = api_url(&self.base_url, path, query)?;
        tracing::debug!(%url, "GET");
        let (name, value) = &self.auth;
        self.http
            .get(url)
            .header(name.clone(), value.clone())
            .send()
            .map_err(Into::into)
    }
}

/// Exchange a username and password for a JWT.
fn login(http: &HttpClient, base_url: &Url, username: &str, password: &str) -> Result<String, Error> {
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Login<'a> {
        username: &'a str,
        password: &'a str,
    }

    #[derive(Deserialize)]
    struct LoginResponse {
        jwt: String,
    }

    if username.is_empty() {
        return Err(Error::InvalidCredentials);
    }

    let path = "api/auth";
    let url = api_url(base_url, path, &[])?;
    tracing::debug!(%url, username, "POST");
    let response = http
        .post(url)
        .json(&Login { username, password })
        .send()?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::Login {
            status,
            body: response.text().unwrap_or_default(),
        });
    }

    decode(path, response).map(|LoginResponse { jwt }| jwt)
}

fn sensitive_header(value: &str) -> Result<HeaderValue, Error> {
    if value.is_empty() {
        return Err(Error::InvalidCredentials);
    }
    let mut value = HeaderValue::from_str(value).map_err(|_| Error::InvalidCredentials)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Join `path` onto `base` and append the `query` pairs.
///
/// Any path in `base` is kept, so Portainer may be served from a sub-path.
fn api_url(base: &Url, path: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
    let mut url = Url::parse(&format!("{}/{path}", base.as_str().trim_end_matches('/')))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Check the status of the `response` to the request for `path` and deserialize its JSON body.
fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, Error> {
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(Error::Status {
            path: path.to_owned(),
            status,
            body,
        });
    }

    serde_json::from_str(&body).map_err(|source| Error::Decode {
        path: path.to_owned(),
        source,
    })
}

/// Find the only container whose ID starts with `reference` or is named `reference`.
fn resolve<'a>(
    containers: &'a [ContainerSummary],
    endpoint: u32,
    reference: &str,
) -> Result<&'a str, Error> {
    let wanted = reference.trim().trim_start_matches('/');
    let no_match = || Error::NoMatch {
        reference: reference.to_owned(),
        endpoint,
    };
    if wanted.is_empty() {
        return Err(no_match());
    }

    let mut matches = containers
        .iter()
        .filter(|container| container.matches(wanted));
    let first = matches.next().ok_or_else(no_match)?;
    let rest: Vec<_> = matches.collect();

    if rest.is_empty() {
        Ok(&first.id)
    } else {
        Err(Error::Ambiguous {
            reference: reference.to_owned(),
            matches: iter::once(first)
                .chain(rest)
                .map(|container| format!("{} ({})", container.display_name(), container.short_id()))
                .collect(),
        })
    }
}

/// Item of the endpoint list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointSummary {
    pub id: u32,

    pub name: String,

    #[serde(rename = "URL", default)]
    pub url: String,
}

impl Display for EndpointSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self { id, name, url } = self;
        if url.is_empty() {
            write!(f, "{name} (#{id})")
        } else {
            write!(f, "{name} (#{id}, {url})")
        }
    }
}

/// Item of the container list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,

    /// Names start with a `/`.
    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub image: String,

    /// For example, "running" or "exited".
    #[serde(default)]
    pub state: String,
}

impl ContainerSummary {
    /// The first name of the container without its leading `/`, or its short ID if it has no
    /// names.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map_or_else(|| self.short_id(), |name| name.trim_start_matches('/'))
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }

    fn matches(&self, reference: &str) -> bool {
        self.id.starts_with(reference)
            || self
                .names
                .iter()
                .any(|name| name.trim_start_matches('/') == reference)
    }
}

impl Display for ContainerSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({}) - {}", self.display_name(), self.short_id(), self.state)
    }
}

/// Error returned when talking to Portainer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Portainer URL `{0}` must start with http:// or https://")]
    Scheme(Url),

    #[error("invalid Portainer URL")]
    Url(#[from] url::ParseError),

    #[error("credentials must not be empty and may only contain visible ASCII characters")]
    InvalidCredentials,

    #[error("error sending request to Portainer")]
    Http(#[from] reqwest::Error),

    #[error("failed to authenticate with Portainer: HTTP {status} {body}")]
    Login { status: StatusCode, body: String },

    #[error("Portainer responded to `{path}` with HTTP {status} {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response from Portainer for `{path}`")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no container matching `{reference}` on endpoint {endpoint}")]
    NoMatch { reference: String, endpoint: u32 },

    #[error("multiple containers match `{reference}`: {}", matches.join(", "))]
    Ambiguous {
        reference: String,
        matches: Vec<String>,
    },

    #[error("container configuration is malformed")]
    Malformed(#[from] MalformedContainerError),
}
