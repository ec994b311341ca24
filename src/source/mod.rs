//! Property sources: ordered, read-only providers of dotted key/value pairs.

mod env;
mod error;
mod file;
mod name;

use std::collections::BTreeMap;
use std::fmt;

pub use env::EnvSource;
pub use error::SourceError;
pub use file::FileSource;
pub use name::{Element, InvalidNameError, PropertyName};

/// A single configuration property located in a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// The name the property is stored under, spelling preserved.
    pub name: PropertyName,
    /// The raw, unconverted value.
    pub value: String,
    /// The name of the source the property came from.
    pub origin: String,
}

/// Whether a source holds any key below a given name.
///
/// `Unknown` is reported by sources that cannot enumerate their keys; the
/// binder treats it as "possibly present".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescendantState {
    Present,
    Absent,
    Unknown,
}

/// A read-only provider of configuration properties.
///
/// Sources are consulted in registration order; the first source holding a
/// name wins for direct lookups.
pub trait PropertySource: Send + Sync + fmt::Debug {
    /// A stable identifier for diagnostics (e.g. `env:MYAPP` or a file path).
    fn name(&self) -> &str;

    /// Direct lookup by exact (canonical) name.
    fn get(&self, name: &PropertyName) -> Option<Property>;

    /// Whether any key strictly below `name` exists in this source.
    fn descendant_state(&self, name: &PropertyName) -> DescendantState;

    /// All known keys strictly below `name`.
    ///
    /// Non-enumerable sources return an empty list and report `Unknown`
    /// from [`descendant_state`](Self::descendant_state).
    fn descendants(&self, name: &PropertyName) -> Vec<PropertyName>;
}

/// An in-memory property source backed by a sorted map.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    entries: BTreeMap<PropertyName, String>,
}

impl MapSource {
    /// Creates an empty source with the given diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Inserts a property, replacing any previous value under the same
    /// canonical name.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), InvalidNameError> {
        let name = PropertyName::parse(key)?;
        self.entries.insert(name, value.into());
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    ///
    /// # Panics
    ///
    /// Panics if `key` is not a valid property name.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let name = PropertyName::parse(key)
            .unwrap_or_else(|e| panic!("invalid property key: {e}"));
        self.entries.insert(name, value.into());
        self
    }

    pub(crate) fn from_entries(
        name: impl Into<String>,
        entries: BTreeMap<PropertyName, String>,
    ) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, name: &PropertyName) -> Option<Property> {
        self.entries.get_key_value(name).map(|(key, value)| Property {
            name: key.clone(),
            value: value.clone(),
            origin: self.name.clone(),
        })
    }

    fn descendant_state(&self, name: &PropertyName) -> DescendantState {
        if self.entries.keys().any(|key| name.is_ancestor_of(key)) {
            DescendantState::Present
        } else {
            DescendantState::Absent
        }
    }

    fn descendants(&self, name: &PropertyName) -> Vec<PropertyName> {
        self.entries
            .keys()
            .filter(|key| name.is_ancestor_of(key))
            .cloned()
            .collect()
    }
}
