//! The configuration binding engine.
//!
//! A [`Binder`] takes an ordered set of [property sources](crate::source)
//! and binds dotted names into strongly-typed values: scalars, nested
//! structures, collections, maps and arrays. Classification is
//! type-directed: the declared shape of the target decides whether a name
//! prefix is treated as an aggregate, a literal scalar, or a structure
//! bound member-by-member.

mod aggregate;
mod convert;
mod error;
mod handler;
mod placeholder;
mod structure;
mod target;

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use crate::source::{DescendantState, Property, PropertyName, PropertySource};

use placeholder::PlaceholderResolver;
use structure::SchemaCache;

pub use convert::ConverterRegistry;
pub use error::BindError;
pub use handler::{
    BindHandler, DenyUnknownKeysHandler, IgnoreErrorsHandler, IgnoreInvalidValuesHandler,
    ValidationFailure, ValidationHandler, Validator,
};
pub use target::{
    BindTarget, Bindable, BoxedValue, ListAssembler, MapAssembler, Shape, StructSchema,
    StructSchemaBuilder,
};

/// Default cap on nested structure/aggregate depth.
const DEFAULT_MAX_DEPTH: usize = 32;

/// The outcome of a successful bind call: a value, or nothing configured.
///
/// Absence is deliberately not an error; failures are reported through
/// [`BindError`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum BindResult<T> {
    Bound(T),
    Unbound,
}

impl<T> BindResult<T> {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindResult::Bound(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            BindResult::Bound(value) => Some(value),
            BindResult::Unbound => None,
        }
    }

    /// Returns the bound value, or `default` if nothing was configured.
    pub fn unwrap_or(self, default: T) -> T {
        self.into_option().unwrap_or(default)
    }

    pub fn unwrap_or_else(self, default: impl FnOnce() -> T) -> T {
        self.into_option().unwrap_or_else(default)
    }
}

/// Binds values from one or more property sources.
///
/// ## Example
///
/// ```
/// use propbind::{bind_target, Binder, MapSource};
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Server {
///     port: u16,
///     host: String,
/// }
///
/// bind_target!(Server { port: u16, host: String });
///
/// let binder = Binder::builder()
///     .with_source(
///         MapSource::new("test")
///             .with("server.port", "8080")
///             .with("server.host", "localhost"),
///     )
///     .build();
///
/// let server: Server = binder.bind("server")?.into_option().unwrap();
/// assert_eq!(server.port, 8080);
/// # Ok::<(), propbind::BindError>(())
/// ```
#[derive(Debug)]
pub struct Binder {
    sources: Vec<Arc<dyn PropertySource>>,
    converters: ConverterRegistry,
    schemas: SchemaCache,
    max_depth: usize,
}

impl Binder {
    /// Creates a binder over the given sources with default converters.
    pub fn new(sources: Vec<Arc<dyn PropertySource>>) -> Self {
        Self {
            sources,
            converters: ConverterRegistry::with_defaults(),
            schemas: SchemaCache::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a new binder builder.
    pub fn builder() -> BinderBuilder {
        BinderBuilder::default()
    }

    /// Binds `name` to a `T`, surfacing any error to the caller.
    ///
    /// An unconfigured name yields [`BindResult::Unbound`], never an error.
    pub fn bind<T: BindTarget>(&self, name: &str) -> Result<BindResult<T>, BindError> {
        self.bind_with(name, &[])
    }

    /// Binds `name` to a `T` with the given handler stages installed.
    pub fn bind_with<T: BindTarget>(
        &self,
        name: &str,
        handlers: &[Arc<dyn BindHandler>],
    ) -> Result<BindResult<T>, BindError> {
        self.bind_bindable(name, Bindable::of::<T>(), handlers)
    }

    /// Binds `name` onto an existing instance, mutating the members that
    /// have matching properties. Returns the instance unchanged if nothing
    /// under `name` is configured.
    pub fn bind_into<T: BindTarget + Clone>(
        &self,
        name: &str,
        instance: T,
    ) -> Result<T, BindError> {
        let target = Bindable::of::<T>().with_existing(instance.clone());
        match self.bind_bindable::<T>(name, target, &[])? {
            BindResult::Bound(value) => Ok(value),
            BindResult::Unbound => Ok(instance),
        }
    }

    /// Binds `name` using a prepared [`Bindable`] descriptor, e.g. one with
    /// validators attached.
    pub fn bind_bindable<T: Any>(
        &self,
        name: &str,
        target: Bindable,
        handlers: &[Arc<dyn BindHandler>],
    ) -> Result<BindResult<T>, BindError> {
        let name = PropertyName::parse(name)?;
        let mut context = BindContext::new(self.sources.clone(), self.max_depth);
        let bound = self.bind_value(&name, target, handlers, &mut context, false)?;
        tracing::debug!(
            "bound '{name}': {}",
            if bound.is_some() { "value" } else { "absent" }
        );
        Ok(match bound {
            Some(value) => BindResult::Bound(
                *value
                    .downcast::<T>()
                    .expect("handlers must not substitute an incompatible target"),
            ),
            None => BindResult::Unbound,
        })
    }

    pub(crate) fn bind_value(
        &self,
        name: &PropertyName,
        target: Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
        allow_recursive: bool,
    ) -> Result<Option<BoxedValue>, BindError> {
        context.clear_last_property();
        let mut target = target;
        for handler in handlers {
            match handler.on_start(name, target, context) {
                Some(substituted) => target = substituted,
                None => return Ok(None),
            }
        }
        match self.bind_frame(name, &mut target, handlers, context, allow_recursive) {
            Ok(value) => Ok(value),
            Err(error) => self.handle_failure(name, &target, handlers, context, error),
        }
    }

    fn bind_frame(
        &self,
        name: &PropertyName,
        target: &mut Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
        allow_recursive: bool,
    ) -> Result<Option<BoxedValue>, BindError> {
        let bound = self.bind_object(name, target, handlers, context, allow_recursive)?;
        let bound = match bound {
            Some(mut value) => {
                for handler in handlers {
                    value = handler.on_success(name, target, context, value)?;
                }
                Some(value)
            }
            None => None,
        };
        for handler in handlers {
            handler.on_finish(name, target, context, bound.as_deref())?;
        }
        Ok(bound)
    }

    fn handle_failure(
        &self,
        name: &PropertyName,
        target: &Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &BindContext,
        error: BindError,
    ) -> Result<Option<BoxedValue>, BindError> {
        let mut error = error;
        for handler in handlers {
            match handler.on_failure(name, target, context, error) {
                Ok(replacement) => return Ok(replacement),
                Err(next) => error = next,
            }
        }
        // Wrap once with bind context; deeper frames already did.
        Err(match error {
            wrapped @ BindError::Failed { .. } => wrapped,
            other => BindError::Failed {
                name: name.to_string(),
                type_name: target.type_name(),
                property: context.last_property().cloned(),
                source: Box::new(other),
            },
        })
    }

    fn bind_object(
        &self,
        name: &PropertyName,
        target: &mut Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
        allow_recursive: bool,
    ) -> Result<Option<BoxedValue>, BindError> {
        let property = self.find_property(name, context);
        if property.is_none() && self.contains_no_descendant_of(name, context) {
            return Ok(None);
        }
        // Classification order: aggregate before literal before structure. A
        // target declared as an aggregate must never be treated as a flat
        // scalar even if a literal value exists at this exact name.
        match target.shape() {
            Shape::Map {
                element, assemble, ..
            } => self.bind_map_aggregate(name, element, assemble, handlers, context),
            Shape::List {
                element,
                assemble,
                type_name,
            }
            | Shape::Array {
                element,
                assemble,
                type_name,
            } => {
                self.bind_indexed_aggregate(name, element, assemble, type_name, handlers, context)
            }
            Shape::Scalar { id, type_name } => match property {
                Some(property) => self.bind_literal(name, &property, id, type_name).map(Some),
                None => Ok(None),
            },
            Shape::Structure {
                schema,
                id,
                type_name,
            } => {
                if let Some(property) = &property {
                    match self.bind_literal(name, property, id, type_name) {
                        Ok(value) => return Ok(Some(value)),
                        // No registered converter for the structure type:
                        // fall back to member-wise binding. Scalar targets
                        // get no such fallback.
                        Err(BindError::NoConverter { .. }) => {}
                        Err(error) => return Err(error),
                    }
                }
                self.bind_structure(
                    name,
                    target,
                    handlers,
                    context,
                    allow_recursive,
                    schema,
                    id,
                    type_name,
                )
            }
        }
    }

    fn bind_literal(
        &self,
        name: &PropertyName,
        property: &Property,
        id: std::any::TypeId,
        type_name: &'static str,
    ) -> Result<BoxedValue, BindError> {
        let resolver = PlaceholderResolver::new(&self.sources);
        let resolved = resolver.resolve(name, &property.value)?;
        self.converters.convert_to(id, type_name, &resolved)
    }

    fn find_property(&self, name: &PropertyName, context: &mut BindContext) -> Option<Property> {
        if name.is_empty() {
            return None;
        }
        let found = context.sources().iter().find_map(|source| source.get(name));
        let property = found?;
        tracing::trace!("'{name}' found in {}", property.origin);
        context.record_consumed(name);
        context.set_last_property(property.clone());
        Some(property)
    }

    fn contains_no_descendant_of(&self, name: &PropertyName, context: &BindContext) -> bool {
        context
            .sources()
            .iter()
            .all(|source| source.descendant_state(name) == DescendantState::Absent)
    }
}

/// Builder for [`Binder`].
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct BinderBuilder {
    sources: Vec<Arc<dyn PropertySource>>,
    converters: ConverterRegistry,
    max_depth: usize,
}

impl Default for BinderBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            converters: ConverterRegistry::with_defaults(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BinderBuilder {
    /// Adds a property source. Sources are consulted in registration order,
    /// earlier sources taking precedence.
    pub fn with_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Adds an already-shared property source.
    pub fn with_shared_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Registers a scalar converter for `T`.
    pub fn with_converter<T, F>(mut self, convert: F) -> Self
    where
        T: Any,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.converters.register(convert);
        self
    }

    /// Caps nested structure/aggregate depth; deeper graphs fail fast with
    /// [`BindError::RecursionLimit`] instead of overflowing the stack.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(self) -> Binder {
        Binder {
            sources: self.sources,
            converters: self.converters,
            schemas: SchemaCache::new(),
            max_depth: self.max_depth,
        }
    }
}

/// Mutable state for one top-level bind call.
///
/// Tracks recursion depth, the stack of structure types currently being
/// bound (for re-entrancy rejection), an optional narrowed source view used
/// while binding aggregate elements, the last located property (for error
/// reporting) and the set of consumed names (for the unknown-key policy).
pub struct BindContext {
    all_sources: Vec<Arc<dyn PropertySource>>,
    source_override: Vec<Arc<dyn PropertySource>>,
    active: Vec<std::any::TypeId>,
    depth: usize,
    max_depth: usize,
    last_property: Option<Property>,
    consumed: HashSet<PropertyName>,
}

impl BindContext {
    fn new(sources: Vec<Arc<dyn PropertySource>>, max_depth: usize) -> Self {
        Self {
            all_sources: sources,
            source_override: Vec::new(),
            active: Vec::new(),
            depth: 0,
            max_depth,
            last_property: None,
            consumed: HashSet::new(),
        }
    }

    /// The sources visible to the current frame: the binder's full list, or
    /// a single narrowed source while an aggregate binds its elements.
    pub fn sources(&self) -> &[Arc<dyn PropertySource>] {
        match self.source_override.last() {
            Some(source) => std::slice::from_ref(source),
            None => &self.all_sources,
        }
    }

    /// Current nesting depth; `0` in the outermost frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The most recently located property, if any.
    pub fn last_property(&self) -> Option<&Property> {
        self.last_property.as_ref()
    }

    /// Whether a source key was consumed by some bind step in this call.
    pub fn is_consumed(&self, name: &PropertyName) -> bool {
        self.consumed.contains(name)
    }

    pub(crate) fn record_consumed(&mut self, name: &PropertyName) {
        self.consumed.insert(name.clone());
    }

    pub(crate) fn set_last_property(&mut self, property: Property) {
        self.last_property = Some(property);
    }

    pub(crate) fn clear_last_property(&mut self) {
        self.last_property = None;
    }

    pub(crate) fn push_source(&mut self, source: Arc<dyn PropertySource>) {
        self.source_override.push(source);
    }

    pub(crate) fn pop_source(&mut self) {
        self.source_override.pop();
    }

    pub(crate) fn is_binding(&self, id: std::any::TypeId) -> bool {
        self.active.contains(&id)
    }

    pub(crate) fn enter_structure(
        &mut self,
        name: &PropertyName,
        id: std::any::TypeId,
    ) -> Result<(), BindError> {
        self.increase_depth(name)?;
        self.active.push(id);
        Ok(())
    }

    pub(crate) fn exit_structure(&mut self) {
        self.active.pop();
        self.decrease_depth();
    }

    pub(crate) fn increase_depth(&mut self, name: &PropertyName) -> Result<(), BindError> {
        if self.depth >= self.max_depth {
            return Err(BindError::RecursionLimit {
                name: name.to_string(),
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn decrease_depth(&mut self) {
        self.depth -= 1;
    }
}
