//! Conversion of Docker `KEY=VALUE` environment entries into Kubernetes [`EnvVar`]s.

use indexmap::IndexMap;
use k8s_openapi::api::core::v1::EnvVar;

/// Convert `KEY=VALUE` entries into [`EnvVar`]s.
///
/// Entries are split on the first `=`, so values may contain `=`. Entries without `=` or with an
/// empty key are skipped. When a key is repeated, the last value wins and the variable takes the
/// position of its last occurrence.
pub fn transform_env<I>(entries: I) -> Vec<EnvVar>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut vars: IndexMap<String, String> = IndexMap::new();

    for entry in entries {
        let entry = entry.as_ref();
        let Some((name, value)) = entry.split_once('=').filter(|(name, _)| !name.is_empty())
        else {
            tracing::warn!(entry, "skipping malformed environment entry");
            continue;
        };
        vars.shift_remove(name);
        vars.insert(name.to_owned(), value.to_owned());
    }

    vars.into_iter()
        .map(|(name, value)| EnvVar {
            name,
            value: Some(value),
            ..EnvVar::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(vars: &[EnvVar]) -> Vec<(&str, &str)> {
        vars.iter()
            .map(|var| (var.name.as_str(), var.value.as_deref().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn last_occurrence_wins() {
        let vars = transform_env(["A=1", "B=2", "A=3"]);
        assert_eq!(pairs(&vars), [("B", "2"), ("A", "3")]);
    }

    #[test]
    fn split_on_first_equals() {
        let vars = transform_env(["DSN=postgres://u:p@db/app?sslmode=require", "EMPTY="]);
        assert_eq!(
            pairs(&vars),
            [
                ("DSN", "postgres://u:p@db/app?sslmode=require"),
                ("EMPTY", ""),
            ],
        );
    }

    #[test]
    fn malformed_skipped() {
        let vars = transform_env(["NOVALUE", "=orphan", "PATH=/usr/bin"]);
        assert_eq!(pairs(&vars), [("PATH", "/usr/bin")]);
    }

    #[test]
    fn empty() {
        assert!(transform_env(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn deterministic() {
        let entries = ["X=1", "Y=2", "X=3", "Z=4", "Y=5"];
        assert_eq!(transform_env(entries), transform_env(entries));
        assert_eq!(
            pairs(&transform_env(entries)),
            [("X", "3"), ("Z", "4"), ("Y", "5")],
        );
    }
}
