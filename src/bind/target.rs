//! Bind target descriptors.
//!
//! A [`Bindable`] describes *what* is being bound: its [`Shape`] (scalar,
//! aggregate, or structure), an optional existing value to mutate in place,
//! and attached validators. Structures describe their settable members
//! through a [`StructSchema`] descriptor table built once per type and
//! cached by the binder, instead of being rediscovered on every bind.

use std::any::{self, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::source::Element;

use super::handler::Validator;

/// A type-erased bound value.
pub type BoxedValue = Box<dyn Any>;

/// Assembles bound elements into a concrete list or array value.
pub type ListAssembler = fn(Vec<BoxedValue>) -> BoxedValue;

/// Assembles bound `(key, value)` entries into a concrete map value.
pub type MapAssembler = fn(Vec<(String, BoxedValue)>) -> BoxedValue;

type SchemaFn = fn() -> StructSchema;

/// The declared shape of a bind target, driving classification in the
/// binder: aggregates dispatch to the aggregate binders, scalars go through
/// placeholder resolution and conversion, structures bind member-wise.
#[derive(Clone, Copy, Debug)]
pub enum Shape {
    Scalar {
        id: TypeId,
        type_name: &'static str,
    },
    List {
        element: fn() -> Bindable,
        assemble: ListAssembler,
        type_name: &'static str,
    },
    Array {
        element: fn() -> Bindable,
        assemble: ListAssembler,
        type_name: &'static str,
    },
    Map {
        element: fn() -> Bindable,
        assemble: MapAssembler,
        type_name: &'static str,
    },
    Structure {
        schema: SchemaFn,
        id: TypeId,
        type_name: &'static str,
    },
}

impl Shape {
    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Scalar { type_name, .. }
            | Shape::List { type_name, .. }
            | Shape::Array { type_name, .. }
            | Shape::Map { type_name, .. }
            | Shape::Structure { type_name, .. } => type_name,
        }
    }
}

/// A descriptor of a bind target.
///
/// Created fresh for every bind frame; recursive binds build child
/// descriptors for each member or element.
pub struct Bindable {
    shape: Shape,
    existing: Option<BoxedValue>,
    validators: Vec<Arc<dyn Validator>>,
}

impl Bindable {
    /// The descriptor for a [`BindTarget`] type.
    pub fn of<T: BindTarget>() -> Self {
        T::bindable()
    }

    /// A scalar-shaped descriptor for `T`, converted via the binder's
    /// converter registry.
    pub fn scalar<T: Any>() -> Self {
        Self::from_shape(Shape::Scalar {
            id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        })
    }

    /// A structure-shaped descriptor for `T`, bound member-wise through the
    /// schema the given function builds. The binder caches the built schema
    /// per type.
    pub fn structure<T: Any>(schema: SchemaFn) -> Self {
        Self::from_shape(Shape::Structure {
            schema,
            id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        })
    }

    pub(crate) fn from_shape(shape: Shape) -> Self {
        Self {
            shape,
            existing: None,
            validators: Vec::new(),
        }
    }

    /// Attaches an existing value; structures bind onto it in place.
    pub fn with_existing<T: Any>(self, value: T) -> Self {
        self.with_existing_boxed(Box::new(value))
    }

    pub(crate) fn with_existing_boxed(mut self, value: BoxedValue) -> Self {
        self.existing = Some(value);
        self
    }

    /// Attaches a validator, run by the validation handler when installed.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn type_name(&self) -> &'static str {
        self.shape.type_name()
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    pub(crate) fn take_existing(&mut self) -> Option<BoxedValue> {
        self.existing.take()
    }
}

impl fmt::Debug for Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("shape", &self.shape)
            .field("has_existing", &self.existing.is_some())
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// A type that can be used as a bind target.
///
/// Implemented for the built-in scalars, `Vec<T>`, `Box<[T]>`,
/// `HashMap<String, T>` and `BTreeMap<String, T>`. Structure types implement
/// it by describing their members, usually through the
/// [`bind_target!`](crate::bind_target) macro.
pub trait BindTarget: Any + Sized {
    fn bindable() -> Bindable;
}

macro_rules! scalar_bind_target {
    ($($ty:ty),* $(,)?) => {$(
        impl BindTarget for $ty {
            fn bindable() -> Bindable {
                Bindable::scalar::<$ty>()
            }
        }
    )*};
}

scalar_bind_target!(
    bool, char, String, std::path::PathBuf, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize,
    f32, f64,
);

fn downcast_element<T: Any>(value: BoxedValue) -> T {
    *value
        .downcast::<T>()
        .expect("aggregate element bound to its declared type")
}

fn assemble_vec<T: Any>(items: Vec<BoxedValue>) -> BoxedValue {
    Box::new(
        items
            .into_iter()
            .map(downcast_element::<T>)
            .collect::<Vec<T>>(),
    )
}

fn assemble_boxed_slice<T: Any>(items: Vec<BoxedValue>) -> BoxedValue {
    Box::new(
        items
            .into_iter()
            .map(downcast_element::<T>)
            .collect::<Vec<T>>()
            .into_boxed_slice(),
    )
}

fn assemble_hash_map<T: Any>(entries: Vec<(String, BoxedValue)>) -> BoxedValue {
    Box::new(
        entries
            .into_iter()
            .map(|(key, value)| (key, downcast_element::<T>(value)))
            .collect::<HashMap<String, T>>(),
    )
}

fn assemble_btree_map<T: Any>(entries: Vec<(String, BoxedValue)>) -> BoxedValue {
    Box::new(
        entries
            .into_iter()
            .map(|(key, value)| (key, downcast_element::<T>(value)))
            .collect::<BTreeMap<String, T>>(),
    )
}

impl<T: BindTarget> BindTarget for Vec<T> {
    fn bindable() -> Bindable {
        Bindable::from_shape(Shape::List {
            element: T::bindable,
            assemble: assemble_vec::<T>,
            type_name: any::type_name::<Vec<T>>(),
        })
    }
}

impl<T: BindTarget> BindTarget for Box<[T]> {
    fn bindable() -> Bindable {
        Bindable::from_shape(Shape::Array {
            element: T::bindable,
            assemble: assemble_boxed_slice::<T>,
            type_name: any::type_name::<Box<[T]>>(),
        })
    }
}

impl<T: BindTarget> BindTarget for HashMap<String, T> {
    fn bindable() -> Bindable {
        Bindable::from_shape(Shape::Map {
            element: T::bindable,
            assemble: assemble_hash_map::<T>,
            type_name: any::type_name::<HashMap<String, T>>(),
        })
    }
}

impl<T: BindTarget> BindTarget for BTreeMap<String, T> {
    fn bindable() -> Bindable {
        Bindable::from_shape(Shape::Map {
            element: T::bindable,
            assemble: assemble_btree_map::<T>,
            type_name: any::type_name::<BTreeMap<String, T>>(),
        })
    }
}

/// A settable member of a structure type.
pub(crate) struct Member {
    pub(crate) element: Element,
    pub(crate) bindable: fn() -> Bindable,
    pub(crate) validators: Vec<Arc<dyn Validator>>,
    pub(crate) get: Box<dyn Fn(&dyn Any) -> BoxedValue + Send + Sync>,
    /// `None` marks a read-only member: a differing bound value is a fatal
    /// configuration error.
    pub(crate) set: Option<Box<dyn Fn(&mut dyn Any, BoxedValue) + Send + Sync>>,
    pub(crate) equals: Box<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>,
}

/// The member-descriptor table for a structure type.
///
/// Built once per type (lazily, through the function stored in the shape)
/// and cached by the binder.
pub struct StructSchema {
    pub(crate) type_name: &'static str,
    pub(crate) instantiate: Box<dyn Fn() -> BoxedValue + Send + Sync>,
    pub(crate) members: Vec<Member>,
}

impl StructSchema {
    /// Starts a schema for `T`. Member names are canonicalized the same way
    /// property names are, so a `max_size` field matches `max-size` keys.
    pub fn of<T: Any + Default>() -> StructSchemaBuilder<T> {
        StructSchemaBuilder {
            members: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl fmt::Debug for StructSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructSchema")
            .field("type_name", &self.type_name)
            .field("members", &self.members.len())
            .finish()
    }
}

/// Builder for [`StructSchema`].
#[must_use = "builders do nothing until .finish() is called"]
pub struct StructSchemaBuilder<T> {
    members: Vec<Member>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Default> StructSchemaBuilder<T> {
    /// Adds a mutable member.
    pub fn member<M, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        M: BindTarget + PartialEq,
        G: Fn(&T) -> M + Send + Sync + 'static,
        S: Fn(&mut T, M) + Send + Sync + 'static,
    {
        let set: Box<dyn Fn(&mut dyn Any, BoxedValue) + Send + Sync> =
            Box::new(move |instance, value| {
                let instance = instance
                    .downcast_mut::<T>()
                    .expect("schema applied to its own type");
                set(instance, downcast_member::<M>(value));
            });
        self.push::<M, G>(name, get, Some(set))
    }

    /// Adds a read-only member: binding a value that differs from the
    /// current one fails, an equal value binds silently.
    pub fn read_only<M, G>(self, name: &str, get: G) -> Self
    where
        M: BindTarget + PartialEq,
        G: Fn(&T) -> M + Send + Sync + 'static,
    {
        self.push::<M, G>(name, get, None)
    }

    /// Attaches a validator to a previously added member.
    ///
    /// # Panics
    ///
    /// Panics if no member with that name exists.
    pub fn validate(mut self, name: &str, validator: Arc<dyn Validator>) -> Self {
        let element = parse_member_name(name);
        let member = self
            .members
            .iter_mut()
            .find(|m| m.element == element)
            .unwrap_or_else(|| panic!("no member named '{name}' to validate"));
        member.validators.push(validator);
        self
    }

    fn push<M, G>(
        mut self,
        name: &str,
        get: G,
        set: Option<Box<dyn Fn(&mut dyn Any, BoxedValue) + Send + Sync>>,
    ) -> Self
    where
        M: BindTarget + PartialEq,
        G: Fn(&T) -> M + Send + Sync + 'static,
    {
        let get: Box<dyn Fn(&dyn Any) -> BoxedValue + Send + Sync> = Box::new(move |instance| {
            let instance = instance
                .downcast_ref::<T>()
                .expect("schema applied to its own type");
            Box::new(get(instance)) as BoxedValue
        });
        let equals: Box<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync> =
            Box::new(|a, b| match (a.downcast_ref::<M>(), b.downcast_ref::<M>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            });
        self.members.push(Member {
            element: parse_member_name(name),
            bindable: M::bindable,
            validators: Vec::new(),
            get,
            set,
            equals,
        });
        self
    }

    pub fn finish(self) -> StructSchema {
        StructSchema {
            type_name: any::type_name::<T>(),
            instantiate: Box::new(|| Box::new(T::default()) as BoxedValue),
            members: self.members,
        }
    }
}

fn downcast_member<M: Any>(value: BoxedValue) -> M {
    *value
        .downcast::<M>()
        .expect("member value bound to its declared type")
}

fn parse_member_name(name: &str) -> Element {
    Element::named(name).unwrap_or_else(|e| panic!("invalid member name: {e}"))
}

/// Implements [`BindTarget`] for a structure by listing its bindable fields.
///
/// Field types must implement `BindTarget + Clone + PartialEq` and the
/// structure itself `Default`. Field names are matched against property
/// names canonically, so a `max_size` field binds from `max-size`,
/// `maxSize` or `MAX_SIZE` keys.
///
/// ```
/// use propbind::bind_target;
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Server {
///     port: u16,
///     host: String,
/// }
///
/// bind_target!(Server { port: u16, host: String });
/// ```
#[macro_export]
macro_rules! bind_target {
    ($ty:ident { $( $field:ident : $fty:ty ),+ $(,)? }) => {
        impl $crate::bind::BindTarget for $ty {
            fn bindable() -> $crate::bind::Bindable {
                $crate::bind::Bindable::structure::<$ty>(|| {
                    $crate::bind::StructSchema::of::<$ty>()
                        $( .member::<$fty, _, _>(
                            stringify!($field),
                            |s: &$ty| s.$field.clone(),
                            |s: &mut $ty, v: $fty| s.$field = v,
                        ) )+
                        .finish()
                })
            }
        }
    };
}
