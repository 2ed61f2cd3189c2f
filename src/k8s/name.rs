//! Kubernetes resource names, see [`ResourceName`].

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use thiserror::Error;

/// Maximum length of a DNS-1123 label.
pub const MAX_LEN: usize = 63;

/// Name used when nothing is left of the input after sanitizing.
pub const FALLBACK: &str = "container";

/// A name conforming to the Kubernetes
/// [DNS-1123 label](https://kubernetes.io/docs/concepts/overview/working-with-objects/names/#dns-label-names)
/// rules: at most 63 characters, lowercase alphanumeric characters or `-`, starting and ending
/// with an alphanumeric character.
///
/// Create one from an arbitrary Docker name with [`ResourceName::sanitize()`], or validate an
/// existing name (e.g. a namespace) with [`str::parse()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    /// Convert `raw` into a valid name, using [`FALLBACK`] if nothing usable remains.
    ///
    /// The input is lowercased, a leading `/` is removed, every character outside `[a-z0-9-]` is
    /// replaced with `-`, runs of `-` are collapsed, and `-` is trimmed from both ends.
    /// The result is truncated to [`MAX_LEN`] characters.
    ///
    /// Sanitizing is idempotent.
    pub fn sanitize(raw: &str) -> Self {
        Self::try_sanitize(raw).unwrap_or_else(Self::fallback)
    }

    /// Like [`sanitize()`](Self::sanitize()), but returns [`None`] instead of the fallback name.
    pub fn try_sanitize(raw: &str) -> Option<Self> {
        let raw = raw.to_lowercase();
        let raw = raw.strip_prefix('/').unwrap_or(&raw);

        let mut name = String::with_capacity(raw.len());
        for char in raw.chars() {
            if char.is_ascii_lowercase() || char.is_ascii_digit() {
                name.push(char);
            } else if !name.is_empty() && !name.ends_with('-') {
                name.push('-');
            }
        }

        // only ASCII remains, so truncating at any index is on a char boundary
        name.truncate(MAX_LEN);
        trim_end_hyphens(&mut name);

        (!name.is_empty()).then_some(Self(name))
    }

    pub fn fallback() -> Self {
        Self(FALLBACK.to_owned())
    }

    /// Whether this is the [`FALLBACK`] name.
    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK
    }

    /// The default Kubernetes namespace, `default`.
    pub fn default_namespace() -> Self {
        Self(String::from("default"))
    }

    /// Append `-{suffix}`, shortening `self` if needed so the result is still a valid name.
    pub fn with_suffix(&self, suffix: impl Display) -> Self {
        let suffix = format!("-{suffix}");
        let mut name = self.0.clone();
        name.truncate(MAX_LEN.saturating_sub(suffix.len()));
        trim_end_hyphens(&mut name);
        name.push_str(&suffix);
        Self::sanitize(&name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn trim_end_hyphens(name: &mut String) {
    let len = name.trim_end_matches('-').len();
    name.truncate(len);
}

impl Display for ResourceName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

impl FromStr for ResourceName {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if s.len() > MAX_LEN {
            return Err(InvalidNameError::TooLong(s.len()));
        }
        if let Some(char) = s
            .chars()
            .find(|char| !(char.is_ascii_lowercase() || char.is_ascii_digit() || *char == '-'))
        {
            return Err(InvalidNameError::InvalidChar(char));
        }
        if s.starts_with('-') || s.ends_with('-') {
            return Err(InvalidNameError::Hyphen);
        }
        Ok(Self(s.to_owned()))
    }
}

/// Error returned when parsing a [`ResourceName`] from a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    #[error("name must not be empty")]
    Empty,

    #[error("name is {0} characters long, the maximum is 63")]
    TooLong(usize),

    #[error("invalid character `{0}`, only lowercase alphanumeric characters and `-` are allowed")]
    InvalidChar(char),

    #[error("name must start and end with an alphanumeric character")]
    Hyphen,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "/",
        "/nginx_1",
        "My Web.App",
        "--already-ok--",
        "UPPER_case__and..dots",
        "ünïcödé-name",
        "💥",
        "/a/b/c",
        "123",
        "container",
        "nginx-1",
        "x-----------------------------------------------------------------y",
        "abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwxyzabcdefghij-klmnop",
    ];

    /// `^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$`
    fn is_dns_label(name: &str) -> bool {
        let alphanumeric = |byte: &u8| byte.is_ascii_lowercase() || byte.is_ascii_digit();
        let bytes = name.as_bytes();
        (1..=MAX_LEN).contains(&bytes.len())
            && bytes.first().is_some_and(alphanumeric)
            && bytes.last().is_some_and(alphanumeric)
            && bytes.iter().all(|byte| alphanumeric(byte) || *byte == b'-')
    }

    proptest! {
        #[test]
        fn any_string_sanitizes_to_label(raw in any::<String>()) {
            let name = ResourceName::sanitize(&raw);
            prop_assert!(is_dns_label(name.as_str()), "{raw:?} -> {name}");
            prop_assert!(name.as_str().parse::<ResourceName>().is_ok());
        }

        #[test]
        fn any_string_sanitizes_idempotently(raw in any::<String>()) {
            let once = ResourceName::sanitize(&raw);
            prop_assert_eq!(ResourceName::sanitize(once.as_str()), once);
        }

        #[test]
        fn docker_like_names_sanitize_to_labels(raw in "/?[A-Za-z0-9_. -]{0,100}") {
            let once = ResourceName::sanitize(&raw);
            prop_assert!(is_dns_label(once.as_str()), "{raw:?} -> {once}");
            prop_assert_eq!(ResourceName::sanitize(once.as_str()), once);
        }
    }

    #[test]
    fn sanitize_leading_slash_and_underscore() {
        assert_eq!(ResourceName::sanitize("/nginx_1").as_str(), "nginx-1");
    }

    #[test]
    fn sanitize_is_valid() {
        for sample in SAMPLES {
            let name = ResourceName::sanitize(sample);
            assert!(is_dns_label(name.as_str()), "{sample:?} -> {name}");
        }
    }

    #[test]
    fn sanitize_is_idempotent() {
        for sample in SAMPLES {
            let once = ResourceName::sanitize(sample);
            let twice = ResourceName::sanitize(once.as_str());
            assert_eq!(once, twice, "sample: {sample:?}");
        }
    }

    #[test]
    fn valid_name_unchanged() {
        for name in ["nginx", "web-1", "a", "0abc9"] {
            assert_eq!(ResourceName::sanitize(name).as_str(), name);
        }
    }

    #[test]
    fn fallback() {
        assert!(ResourceName::sanitize("").is_fallback());
        assert!(ResourceName::sanitize("/__/").is_fallback());
        assert_eq!(ResourceName::try_sanitize("---"), None);
        assert_eq!(ResourceName::try_sanitize("💥"), None);
    }

    #[test]
    fn truncate_trims_trailing_hyphen() {
        // 62 `a`s followed by `_b`, the 63rd character is a replaced `_`
        let raw = format!("{}_b", "a".repeat(62));
        let name = ResourceName::sanitize(&raw);
        assert_eq!(name.as_str(), "a".repeat(62));
    }

    #[test]
    fn with_suffix() {
        let name = ResourceName::sanitize("data");
        assert_eq!(name.with_suffix(2).as_str(), "data-2");

        let long = ResourceName::sanitize(&"a".repeat(70));
        let suffixed = long.with_suffix("svc");
        assert_eq!(suffixed.as_str().len(), MAX_LEN);
        assert!(suffixed.as_str().ends_with("-svc"));
        assert!(is_dns_label(suffixed.as_str()));
    }

    #[test]
    fn parse() {
        assert_eq!(
            "default".parse::<ResourceName>().unwrap(),
            ResourceName::default_namespace(),
        );
        assert_eq!("".parse::<ResourceName>(), Err(InvalidNameError::Empty));
        assert_eq!(
            "Prod".parse::<ResourceName>(),
            Err(InvalidNameError::InvalidChar('P')),
        );
        assert_eq!("-prod".parse::<ResourceName>(), Err(InvalidNameError::Hyphen));
        assert_eq!(
            "a".repeat(64).parse::<ResourceName>(),
            Err(InvalidNameError::TooLong(64)),
        );
    }
}
