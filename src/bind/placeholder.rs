//! Placeholder resolution for raw property values.
//!
//! Supports `${other.key}` and `${other.key:default}` references, resolved
//! against the binder's source set before type conversion. Use `$${...}` to
//! escape and produce a literal `${...}`.

use std::sync::Arc;

use crate::source::{PropertyName, PropertySource};

use super::BindError;

/// Chains of references deeper than this are treated as cycles.
const MAX_DEPTH: usize = 16;

pub(crate) struct PlaceholderResolver<'a> {
    sources: &'a [Arc<dyn PropertySource>],
}

impl<'a> PlaceholderResolver<'a> {
    pub(crate) fn new(sources: &'a [Arc<dyn PropertySource>]) -> Self {
        Self { sources }
    }

    /// Resolves all `${...}` references in `raw`.
    ///
    /// `name` is the property being bound, used for error reporting only.
    pub(crate) fn resolve(&self, name: &PropertyName, raw: &str) -> Result<String, BindError> {
        self.resolve_at(name, raw, 0)
    }

    fn resolve_at(&self, name: &PropertyName, raw: &str, depth: usize) -> Result<String, BindError> {
        if !raw.contains('$') {
            return Ok(raw.to_string());
        }
        if depth >= MAX_DEPTH {
            return Err(BindError::PlaceholderCycle);
        }

        let mut result = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    // Escape sequence: $$ -> $
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let reference = consume_until(&mut chars, '}')
                        .ok_or(BindError::UnclosedPlaceholder)?;
                    let (key, default) = match reference.split_once(':') {
                        Some((key, default)) => (key, Some(default)),
                        None => (reference.as_str(), None),
                    };
                    match (self.lookup(key)?, default) {
                        (Some(value), _) => {
                            // Referenced values may themselves contain references.
                            let resolved = self.resolve_at(name, &value, depth + 1)?;
                            result.push_str(&resolved);
                        }
                        (None, Some(default)) => result.push_str(default),
                        (None, None) => {
                            return Err(BindError::UnresolvedPlaceholder {
                                name: name.to_string(),
                                key: key.to_string(),
                            });
                        }
                    }
                }
                _ => {
                    // Just a lone $
                    result.push('$');
                }
            }
        }

        Ok(result)
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, BindError> {
        let name = PropertyName::parse(key)?;
        for source in self.sources {
            if let Some(property) = source.get(&name) {
                return Ok(Some(property.value));
            }
        }
        Ok(None)
    }
}

/// Consumes characters until the delimiter, returning the collected string.
fn consume_until(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    delim: char,
) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None // Delimiter not found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MapSource;

    fn resolver_sources(source: MapSource) -> Vec<Arc<dyn PropertySource>> {
        vec![Arc::new(source)]
    }

    fn resolve(source: MapSource, raw: &str) -> Result<String, BindError> {
        let sources = resolver_sources(source);
        let resolver = PlaceholderResolver::new(&sources);
        resolver.resolve(&PropertyName::parse("test").unwrap(), raw)
    }

    #[test]
    fn test_simple_reference() {
        let source = MapSource::new("test").with("host", "localhost");
        assert_eq!(
            resolve(source, "http://${host}/api").unwrap(),
            "http://localhost/api"
        );
    }

    #[test]
    fn test_chained_references() {
        let source = MapSource::new("test")
            .with("a", "hello")
            .with("b", "${a} world");
        assert_eq!(resolve(source, "${b}!").unwrap(), "hello world!");
    }

    #[test]
    fn test_default_value() {
        let source = MapSource::new("test");
        assert_eq!(resolve(source, "${missing:fallback}").unwrap(), "fallback");
    }

    #[test]
    fn test_escape_sequence() {
        let source = MapSource::new("test");
        assert_eq!(
            resolve(source, "use $${VAR} for env vars").unwrap(),
            "use ${VAR} for env vars"
        );
    }

    #[test]
    fn test_missing_reference() {
        let source = MapSource::new("test");
        let result = resolve(source, "${nonexistent.path}");
        assert!(matches!(
            result,
            Err(BindError::UnresolvedPlaceholder { .. })
        ));
    }

    #[test]
    fn test_circular_reference() {
        let source = MapSource::new("test").with("a", "${b}").with("b", "${a}");
        let result = resolve(source, "${a}");
        assert!(matches!(result, Err(BindError::PlaceholderCycle)));
    }

    #[test]
    fn test_unclosed_reference() {
        let source = MapSource::new("test");
        let result = resolve(source, "${open");
        assert!(matches!(result, Err(BindError::UnclosedPlaceholder)));
    }
}
