//! Portainer connection settings persisted between runs, see [`ConfigFile`].

use std::{
    fmt::{self, Display, Formatter},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use color_eyre::{Help, eyre::WrapErr};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default location of the settings file, relative to the current working directory.
pub const DEFAULT_PATH: &str = "config.yaml";

/// Contents of the settings file.
///
/// Passwords are never part of the settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub portainer: PortainerSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortainerSettings {
    /// Base URL of the Portainer instance, including the scheme.
    pub url: Url,

    /// ID of the Docker endpoint containers are read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<u32>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<AuthMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl AuthSettings {
    /// The configured [`AuthMethod`], or the one implied by which credential is set.
    pub fn method(&self) -> Option<AuthMethod> {
        self.method.or_else(|| {
            if self.api_key.is_some() {
                Some(AuthMethod::ApiKey)
            } else {
                self.username.as_ref().map(|_| AuthMethod::UsernamePassword)
            }
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    UsernamePassword,
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::ApiKey => "API key",
            Self::UsernamePassword => "Username and password",
        })
    }
}

/// Location of the settings file.
///
/// Nothing is read or written until [`load()`](Self::load()), [`save()`](Self::save()), or
/// [`delete()`](Self::delete()) is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the [`Settings`] from the file.
    ///
    /// Returns [`None`] if the file does not exist or is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be read or is not valid settings YAML.
    pub fn load(&self) -> color_eyre::Result<Option<Settings>> {
        let path = self.path.display();

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(%path, "settings file not found");
                return Ok(None);
            }
            Err(error) => {
                return Err(error).wrap_err_with(|| format!("error reading settings file: {path}"));
            }
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let settings = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("invalid settings file: {path}"))
            .suggestion("Fix or delete the file, or use `--config` to select another one.")?;
        tracing::debug!(%path, "loaded settings");

        Ok(Some(settings))
    }

    /// Write `settings` to the file, replacing its contents.
    ///
    /// On Unix, the file is only readable and writable by its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be written.
    pub fn save(&self, settings: &Settings) -> color_eyre::Result<()> {
        let path = self.path.display();
        let contents = serde_yaml::to_string(settings).wrap_err("error serializing settings")?;

        let mut options = fs::File::options();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);

        let mut file = options
            .open(&self.path)
            .wrap_err_with(|| format!("error opening settings file: {path}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .wrap_err_with(|| format!("error restricting permissions of: {path}"))?;
        }

        file.write_all(contents.as_bytes())
            .wrap_err_with(|| format!("error writing settings file: {path}"))?;
        tracing::info!(%path, "saved settings");

        Ok(())
    }

    /// Remove the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be removed.
    pub fn delete(&self) -> color_eyre::Result<()> {
        let path = self.path.display();
        fs::remove_file(&self.path)
            .wrap_err_with(|| format!("error removing settings file: {path}"))?;
        tracing::info!(%path, "removed settings");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            portainer: PortainerSettings {
                url: Url::parse("https://portainer.local:9443").unwrap(),
                endpoint_id: Some(2),
                insecure: true,
                auth: AuthSettings {
                    method: Some(AuthMethod::UsernamePassword),
                    api_key: None,
                    username: Some("admin".to_owned()),
                },
            },
        }
    }

    #[test]
    fn missing_or_empty_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(dir.path().join(DEFAULT_PATH));
        assert!(!config.exists());
        assert_eq!(config.load().unwrap(), None);

        fs::write(config.path(), "\n").unwrap();
        assert!(config.exists());
        assert_eq!(config.load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(dir.path().join(DEFAULT_PATH));

        config.save(&settings()).unwrap();
        assert_eq!(config.load().unwrap(), Some(settings()));

        let contents = fs::read_to_string(config.path()).unwrap();
        assert!(contents.contains("method: username_password"));
        assert!(!contents.contains("api_key"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(config.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn load_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(dir.path().join("settings.yaml"));
        fs::write(
            config.path(),
            "portainer:\n  url: http://localhost:9000\n  auth:\n    api_key: ptr_abc\n",
        )
        .unwrap();

        let settings = config.load().unwrap().unwrap();
        assert_eq!(settings.portainer.endpoint_id, None);
        assert!(!settings.portainer.insecure);
        assert_eq!(settings.portainer.auth.method(), Some(AuthMethod::ApiKey));
    }

    #[test]
    fn invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(dir.path().join(DEFAULT_PATH));
        fs::write(config.path(), "portainer:\n  url: not a url\n").unwrap();
        assert!(config.load().is_err());
    }

    #[test]
    fn delete() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::new(dir.path().join(DEFAULT_PATH));
        config.save(&settings()).unwrap();

        config.delete().unwrap();
        assert!(!config.exists());
        assert!(config.delete().is_err());
    }

    #[test]
    fn implied_auth_method() {
        let mut auth = AuthSettings::default();
        assert_eq!(auth.method(), None);

        auth.username = Some("admin".to_owned());
        assert_eq!(auth.method(), Some(AuthMethod::UsernamePassword));

        auth.method = Some(AuthMethod::ApiKey);
        assert_eq!(auth.method(), Some(AuthMethod::ApiKey));
    }
}
