//! Scalar conversion from raw string values to typed values.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::target::BoxedValue;
use super::BindError;

type ConvertFn = Box<dyn Fn(&str) -> Result<BoxedValue, String> + Send + Sync>;

/// A registry of per-type scalar converters.
///
/// The binder asks the registry to convert whenever a literal value is found
/// for a scalar-shaped target (or for a structure-shaped target, where a
/// missing converter triggers the member-wise fallback instead of an error).
pub struct ConverterRegistry {
    converters: HashMap<TypeId, ConvertFn>,
}

impl ConverterRegistry {
    /// An empty registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// A registry covering the built-in scalar types: `bool`, `char`,
    /// `String`, `PathBuf`, and the integer and float primitives.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_from_str::<char>();
        registry.register_from_str::<String>();
        registry.register_from_str::<u8>();
        registry.register_from_str::<u16>();
        registry.register_from_str::<u32>();
        registry.register_from_str::<u64>();
        registry.register_from_str::<usize>();
        registry.register_from_str::<i8>();
        registry.register_from_str::<i16>();
        registry.register_from_str::<i32>();
        registry.register_from_str::<i64>();
        registry.register_from_str::<isize>();
        registry.register_from_str::<f32>();
        registry.register_from_str::<f64>();
        registry.register(|raw| Ok(PathBuf::from(raw)));
        registry.register(parse_bool);
        registry
    }

    /// Registers a converter for `T`, replacing any existing one.
    pub fn register<T, F>(&mut self, convert: F)
    where
        T: Any,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.converters.insert(
            TypeId::of::<T>(),
            Box::new(move |raw| convert(raw).map(|value| Box::new(value) as BoxedValue)),
        );
    }

    /// Registers a converter for any `FromStr` type.
    pub fn register_from_str<T>(&mut self)
    where
        T: Any + FromStr,
        T::Err: fmt::Display,
    {
        self.register(|raw| raw.parse::<T>().map_err(|e| e.to_string()));
    }

    pub(crate) fn convert_to(
        &self,
        id: TypeId,
        type_name: &'static str,
        raw: &str,
    ) -> Result<BoxedValue, BindError> {
        let convert = self
            .converters
            .get(&id)
            .ok_or(BindError::NoConverter { type_name })?;
        convert(raw).map_err(|reason| BindError::Parse {
            type_name,
            value: raw.to_string(),
            reason,
        })
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Relaxed boolean coercion: `true/on/yes/1` and `false/off/no/0`,
/// case-insensitive.
fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err("not a boolean".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert<T: Any>(registry: &ConverterRegistry, raw: &str) -> Result<T, BindError> {
        registry
            .convert_to(TypeId::of::<T>(), std::any::type_name::<T>(), raw)
            .map(|value| *value.downcast::<T>().unwrap())
    }

    #[test]
    fn test_default_conversions() {
        let registry = ConverterRegistry::with_defaults();
        assert_eq!(convert::<u16>(&registry, "8080").unwrap(), 8080);
        assert_eq!(convert::<f64>(&registry, "1.5").unwrap(), 1.5);
        assert_eq!(convert::<String>(&registry, "text").unwrap(), "text");
        assert_eq!(
            convert::<PathBuf>(&registry, "/tmp/x").unwrap(),
            PathBuf::from("/tmp/x")
        );
    }

    #[test]
    fn test_relaxed_booleans() {
        let registry = ConverterRegistry::with_defaults();
        for raw in ["true", "TRUE", "on", "yes", "1"] {
            assert!(convert::<bool>(&registry, raw).unwrap(), "{raw}");
        }
        for raw in ["false", "Off", "no", "0"] {
            assert!(!convert::<bool>(&registry, raw).unwrap(), "{raw}");
        }
        assert!(matches!(
            convert::<bool>(&registry, "maybe"),
            Err(BindError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_failure_vs_missing_converter() {
        let registry = ConverterRegistry::with_defaults();
        assert!(matches!(
            convert::<u16>(&registry, "not-a-number"),
            Err(BindError::Parse { .. })
        ));

        struct Custom;
        let result = registry.convert_to(TypeId::of::<Custom>(), "Custom", "x");
        assert!(matches!(result, Err(BindError::NoConverter { .. })));
    }

    #[test]
    fn test_custom_converter() {
        #[derive(Debug, PartialEq)]
        struct Percent(u8);

        let mut registry = ConverterRegistry::with_defaults();
        registry.register(|raw: &str| {
            raw.strip_suffix('%')
                .ok_or_else(|| "missing '%'".to_string())?
                .parse()
                .map(Percent)
                .map_err(|_| "not a number".to_string())
        });
        assert_eq!(convert::<Percent>(&registry, "40%").unwrap(), Percent(40));
    }
}
