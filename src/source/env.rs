//! Environment-variable property source.

use std::collections::BTreeMap;

use super::{DescendantState, Element, MapSource, Property, PropertyName, PropertySource};

/// A property source backed by a snapshot of the process environment.
///
/// Variables are mapped to property names by:
/// 1. Removing the prefix and separator
/// 2. Splitting remaining segments on the separator
/// 3. Converting path segments to lowercase
///
/// All-digit segments become indices, so `MYAPP__HOSTS__0=a` maps to
/// `hosts[0]`. The snapshot is taken once at construction; later environment
/// changes are not observed.
#[derive(Debug, Clone)]
pub struct EnvSource {
    inner: MapSource,
}

impl EnvSource {
    /// Captures all environment variables starting with `prefix` + `separator`.
    ///
    /// # Panics
    ///
    /// Panics if the separator is empty.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let separator = separator.into();
        Self::from_iter(&prefix, &separator, std::env::vars())
    }

    /// Builds a source from an explicit variable list; used by tests and by
    /// callers that capture the environment themselves.
    pub fn from_iter(
        prefix: &str,
        separator: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        assert!(!separator.is_empty(), "separator must not be empty");
        let prefix_with_sep = format!("{prefix}{separator}");
        let mut entries = BTreeMap::new();

        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            if path_str.is_empty() {
                continue;
            }
            match parse_env_path(path_str, separator) {
                Some(name) => {
                    entries.insert(name, value);
                }
                None => {
                    tracing::debug!("skipping environment variable with unmappable name: {key}");
                }
            }
        }

        Self {
            inner: MapSource::from_entries(format!("env:{prefix}"), entries),
        }
    }
}

/// Maps `SERVER__MAX_SIZE`-style remainders to `server.max_size`; all-digit
/// segments become indices.
fn parse_env_path(path: &str, separator: &str) -> Option<PropertyName> {
    let mut name = PropertyName::root();
    for segment in path.split(separator) {
        if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            name = name.append_index(segment.parse().ok()?);
        } else {
            let element = Element::named(&segment.to_lowercase()).ok()?;
            name = name.append_element(&element);
        }
    }
    Some(name)
}

impl PropertySource for EnvSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, name: &PropertyName) -> Option<Property> {
        self.inner.get(name)
    }

    fn descendant_state(&self, name: &PropertyName) -> DescendantState {
        self.inner.descendant_state(name)
    }

    fn descendants(&self, name: &PropertyName) -> Vec<PropertyName> {
        self.inner.descendants(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(vars: &[(&str, &str)]) -> EnvSource {
        EnvSource::from_iter(
            "MYAPP",
            "__",
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_prefix_and_separator_mapping() {
        let source = source(&[
            ("MYAPP__SERVER__PORT", "8080"),
            ("MYAPP__SERVER__MAX_SIZE", "10"),
            ("OTHER__SERVER__PORT", "9090"),
        ]);
        let port = PropertyName::parse("server.port").unwrap();
        assert_eq!(source.get(&port).unwrap().value, "8080");
        // Underscores inside a segment survive the split and canonicalize away.
        let max = PropertyName::parse("server.maxSize").unwrap();
        assert_eq!(source.get(&max).unwrap().value, "10");
        // Unrelated prefixes are not captured.
        assert_eq!(source.descendants(&PropertyName::root()).len(), 2);
    }

    #[test]
    fn test_digit_segments_become_indices() {
        let source = source(&[("MYAPP__HOSTS__0", "a"), ("MYAPP__HOSTS__1", "b")]);
        let first = PropertyName::parse("hosts[0]").unwrap();
        assert_eq!(source.get(&first).unwrap().value, "a");
    }

    #[test]
    fn test_bare_prefix_is_skipped() {
        let source = source(&[("MYAPP__", "x")]);
        assert!(source.descendants(&PropertyName::root()).is_empty());
    }
}
