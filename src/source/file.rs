//! File-based property source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use toml::Value;

use super::{
    DescendantState, Element, MapSource, Property, PropertyName, PropertySource, SourceError,
};

/// A property source that loads a TOML file and flattens it into dotted
/// names: nested tables contribute path segments, arrays contribute `[i]`
/// indices, and scalar values are kept in raw string form for the binder.
///
/// Files can be marked as required or optional. Required files that don't
/// exist cause an error; optional files that don't exist load as empty.
#[derive(Debug, Clone)]
pub struct FileSource {
    inner: MapSource,
}

impl FileSource {
    /// Loads and flattens a TOML config file.
    pub fn load(path: impl AsRef<Path>, required: bool) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let mut entries = BTreeMap::new();
        if let Some(table) = load_config_file(path, required)? {
            flatten(path, &PropertyName::root(), &Value::Table(table), &mut entries)?;
        }
        Ok(Self {
            inner: MapSource::from_entries(path.display().to_string(), entries),
        })
    }
}

/// Loads and parses a TOML config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<toml::Table>, SourceError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| SourceError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(SourceError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(SourceError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn flatten(
    path: &Path,
    prefix: &PropertyName,
    value: &Value,
    out: &mut BTreeMap<PropertyName, String>,
) -> Result<(), SourceError> {
    match value {
        Value::Table(table) => {
            for (key, nested) in table {
                let element = Element::named(key).map_err(|e| SourceError::InvalidKey {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                flatten(path, &prefix.append_element(&element), nested, out)?;
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(path, &prefix.append_index(index), item, out)?;
            }
        }
        Value::String(s) => {
            out.insert(prefix.clone(), s.clone());
        }
        Value::Integer(i) => {
            out.insert(prefix.clone(), i.to_string());
        }
        Value::Float(f) => {
            out.insert(prefix.clone(), f.to_string());
        }
        Value::Boolean(b) => {
            out.insert(prefix.clone(), b.to_string());
        }
        Value::Datetime(dt) => {
            out.insert(prefix.clone(), dt.to_string());
        }
    }
    Ok(())
}

impl PropertySource for FileSource {
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
