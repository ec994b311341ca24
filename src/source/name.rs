//! Canonical dotted property names.
//!
//! A name such as `server.ssl.enabled` or `hosts[0].port` is parsed into an
//! ordered sequence of elements. Comparison is format-insensitive: `maxSize`,
//! `max-size` and `MAX_SIZE` all denote the same element.

use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Error raised when a string cannot be parsed as a property name.
#[derive(Debug, Clone, Error)]
#[error("invalid property name '{name}': {reason}")]
pub struct InvalidNameError {
    pub(crate) name: String,
    pub(crate) reason: String,
}

impl InvalidNameError {
    fn new(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single path element: a named segment or a numeric index.
///
/// Named elements keep their original spelling for display and for
/// case-preserved map keys; equality and ordering use the canonical form only.
#[derive(Debug, Clone)]
pub enum Element {
    Named { original: String, canonical: String },
    Index(usize),
}

impl Element {
    /// Creates a named element, validating its characters.
    ///
    /// Allowed characters are ASCII alphanumerics, `-` and `_`.
    pub fn named(text: &str) -> Result<Self, InvalidNameError> {
        if let Some(c) = text
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(InvalidNameError::new(
                text,
                format!("invalid character '{c}' in element"),
            ));
        }
        let canonical = canonical_form(text);
        if canonical.is_empty() {
            return Err(InvalidNameError::new(
                text,
                "element has no alphanumeric characters",
            ));
        }
        Ok(Element::Named {
            original: text.to_string(),
            canonical,
        })
    }

    /// The canonical comparison form of this element.
    pub fn canonical(&self) -> String {
        match self {
            Element::Named { canonical, .. } => canonical.clone(),
            Element::Index(i) => i.to_string(),
        }
    }

    /// The form used as a map key: original spelling for named elements.
    pub(crate) fn map_key(&self) -> String {
        match self {
            Element::Named { original, .. } => original.clone(),
            Element::Index(i) => i.to_string(),
        }
    }
}

/// Lowercases and strips `-`/`_` so every spelling of an element compares equal.
fn canonical_form(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Element::Named { canonical: a, .. }, Element::Named { canonical: b, .. }) => a == b,
            (Element::Index(a), Element::Index(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Element::Named { canonical, .. } => {
                0u8.hash(state);
                canonical.hash(state);
            }
            Element::Index(i) => {
                1u8.hash(state);
                i.hash(state);
            }
        }
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Element::Index(a), Element::Index(b)) => a.cmp(b),
            (Element::Index(_), Element::Named { .. }) => Ordering::Less,
            (Element::Named { .. }, Element::Index(_)) => Ordering::Greater,
            (Element::Named { canonical: a, .. }, Element::Named { canonical: b, .. }) => a.cmp(b),
        }
    }
}

/// A hierarchical property name.
///
/// Immutable once constructed. Two names are equal iff their canonical
/// element sequences are equal, regardless of the spelling they were parsed
/// from. The empty name denotes the root of the property tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PropertyName {
    elements: Vec<Element>,
}

impl PropertyName {
    /// The empty (root) name.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted name such as `server.port` or `hosts[0].name`.
    pub fn parse(input: &str) -> Result<Self, InvalidNameError> {
        if input.is_empty() {
            return Ok(Self::root());
        }
        let mut elements = Vec::new();
        for chunk in input.split('.') {
            if chunk.is_empty() {
                return Err(InvalidNameError::new(input, "empty path element"));
            }
            let (head, mut rest) = match chunk.find('[') {
                Some(pos) => chunk.split_at(pos),
                None => (chunk, ""),
            };
            if !head.is_empty() {
                elements.push(
                    Element::named(head)
                        .map_err(|e| InvalidNameError::new(input, e.reason))?,
                );
            }
            while !rest.is_empty() {
                let stripped = rest.strip_prefix('[').ok_or_else(|| {
                    InvalidNameError::new(input, "unexpected characters after ']'")
                })?;
                let end = stripped
                    .find(']')
                    .ok_or_else(|| InvalidNameError::new(input, "unclosed '[' in element"))?;
                let index: usize = stripped[..end]
                    .parse()
                    .map_err(|_| InvalidNameError::new(input, "index is not a number"))?;
                elements.push(Element::Index(index));
                rest = &stripped[end + 1..];
            }
        }
        Ok(Self { elements })
    }

    /// Returns true for the root name.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of path elements.
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// The element at `index`, if any.
    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Returns a new name with `element` appended.
    pub fn append_element(&self, element: &Element) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element.clone());
        Self { elements }
    }

    /// Returns a new name with a named segment appended.
    pub fn append(&self, segment: &str) -> Result<Self, InvalidNameError> {
        Ok(self.append_element(&Element::named(segment)?))
    }

    /// Returns a new name with a numeric index appended.
    pub fn append_index(&self, index: usize) -> Self {
        self.append_element(&Element::Index(index))
    }

    /// True if `other` is strictly below this name in the hierarchy.
    pub fn is_ancestor_of(&self, other: &PropertyName) -> bool {
        other.elements.len() > self.elements.len()
            && other.elements[..self.elements.len()] == self.elements[..]
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for element in &self.elements {
            match element {
                Element::Named { original, .. } => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(original)?;
                }
                Element::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let name = PropertyName::parse("server.port").unwrap();
        assert_eq!(name.num_elements(), 2);
        assert_eq!(name.to_string(), "server.port");
    }

    #[test]
    fn test_parse_indexed() {
        let name = PropertyName::parse("hosts[0].name").unwrap();
        assert_eq!(name.num_elements(), 3);
        assert!(matches!(name.element(1), Some(Element::Index(0))));
        assert_eq!(name.to_string(), "hosts[0].name");
    }

    #[test]
    fn test_formats_normalize_identically() {
        let camel = PropertyName::parse("server.maxSize").unwrap();
        let kebab = PropertyName::parse("server.max-size").unwrap();
        let snake = PropertyName::parse("SERVER.MAX_SIZE").unwrap();
        assert_eq!(camel, kebab);
        assert_eq!(kebab, snake);
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let once = PropertyName::parse("Server.Max-Size").unwrap();
        let twice = PropertyName::parse(&once.to_string()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_name_is_root() {
        let name = PropertyName::parse("").unwrap();
        assert!(name.is_empty());
        assert!(name.is_ancestor_of(&PropertyName::parse("anything").unwrap()));
    }

    #[test]
    fn test_invalid_names() {
        assert!(PropertyName::parse("a..b").is_err());
        assert!(PropertyName::parse("a.").is_err());
        assert!(PropertyName::parse("a b").is_err());
        assert!(PropertyName::parse("a[x]").is_err());
        assert!(PropertyName::parse("a[0").is_err());
        assert!(PropertyName::parse("---").is_err());
    }

    #[test]
    fn test_ancestor() {
        let server = PropertyName::parse("server").unwrap();
        let port = PropertyName::parse("server.port").unwrap();
        assert!(server.is_ancestor_of(&port));
        assert!(!port.is_ancestor_of(&server));
        assert!(!server.is_ancestor_of(&server));
    }

    #[test]
    fn test_ancestor_is_format_insensitive() {
        let prefix = PropertyName::parse("myApp.serverSettings").unwrap();
        let leaf = PropertyName::parse("my-app.server-settings.port").unwrap();
        assert!(prefix.is_ancestor_of(&leaf));
    }

    #[test]
    fn test_append() {
        let name = PropertyName::parse("server").unwrap();
        let port = name.append("port").unwrap();
        assert_eq!(port, PropertyName::parse("server.port").unwrap());
        let indexed = name.append_index(2);
        assert_eq!(indexed.to_string(), "server[2]");
    }
}
