//! Member-wise binding of nested structure types.

use std::any::TypeId;
use std::sync::{Arc, Mutex, PoisonError};

use crate::source::PropertyName;

use super::target::{Bindable, BoxedValue, StructSchema};
use super::{BindContext, BindError, BindHandler, Binder};

impl Binder {
    /// Binds `name.member` for every member in the type's schema, then
    /// constructs or mutates an instance only if at least one member bound.
    ///
    /// Re-entrant binding of a type already on the active stack returns
    /// absent instead of recursing, unless the caller (an aggregate binding
    /// its elements) explicitly relaxed the check for this frame.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn bind_structure(
        &self,
        name: &PropertyName,
        target: &mut Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
        allow_recursive: bool,
        schema_fn: fn() -> StructSchema,
        id: TypeId,
        type_name: &'static str,
    ) -> Result<Option<BoxedValue>, BindError> {
        if !allow_recursive && context.is_binding(id) {
            return Ok(None);
        }
        let schema = self.schemas.get_or_build(id, schema_fn);
        context.enter_structure(name, id)?;
        let result = self.bind_members(name, target, handlers, context, &schema, type_name);
        context.exit_structure();
        result
    }

    fn bind_members(
        &self,
        name: &PropertyName,
        target: &mut Bindable,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
        schema: &StructSchema,
        type_name: &'static str,
    ) -> Result<Option<BoxedValue>, BindError> {
        let existing = target.take_existing();
        let mut bound: Vec<(usize, BoxedValue)> = Vec::new();

        for (index, member) in schema.members.iter().enumerate() {
            let child_name = name.append_element(&member.element);
            let mut child = (member.bindable)();
            for validator in &member.validators {
                child = child.with_validator(Arc::clone(validator));
            }
            if let Some(instance) = existing.as_deref() {
                child = child.with_existing_boxed((member.get)(instance));
            }
            if let Some(value) = self.bind_value(&child_name, child, handlers, context, false)? {
                bound.push((index, value));
            }
        }

        if bound.is_empty() {
            return Ok(None);
        }

        // Instantiate only now that the frame is known to bind; a failed
        // frame must never expose a half-mutated instance.
        let mut instance = existing.unwrap_or_else(|| (schema.instantiate)());
        for (index, value) in bound {
            let member = &schema.members[index];
            match &member.set {
                Some(set) => set(instance.as_mut(), value),
                None => {
                    let current = (member.get)(instance.as_ref());
                    if !(member.equals)(current.as_ref(), value.as_ref()) {
                        return Err(BindError::UnsettableMember {
                            type_name,
                            member: member.element.map_key(),
                        });
                    }
                }
            }
        }
        Ok(Some(instance))
    }
}

/// Most-recently-used cache of built structure schemas.
///
/// Building a member table costs allocations for every accessor; binding two
/// sibling instances of the same type within one aggregate should not pay
/// that twice. Keyed by `TypeId` so a stale entry can never be served.
pub(crate) struct SchemaCache {
    slot: Mutex<Option<(TypeId, Arc<StructSchema>)>>,
}

impl SchemaCache {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn get_or_build(
        &self,
        id: TypeId,
        build: fn() -> StructSchema,
    ) -> Arc<StructSchema> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_id, schema)) = slot.as_ref() {
            if *cached_id == id {
                return Arc::clone(schema);
            }
        }
        let schema = Arc::new(build());
        *slot = Some((id, Arc::clone(&schema)));
        schema
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let occupied = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("SchemaCache")
            .field("occupied", &occupied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::StructSchema;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct First {
        value: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Second {
        value: u32,
    }

    fn first_schema() -> StructSchema {
        StructSchema::of::<First>()
            .member::<u32, _, _>("value", |s: &First| s.value, |s, v| s.value = v)
            .finish()
    }

    fn second_schema() -> StructSchema {
        StructSchema::of::<Second>()
            .member::<u32, _, _>("value", |s: &Second| s.value, |s, v| s.value = v)
            .finish()
    }

    #[test]
    fn test_cache_reuses_same_type() {
        let cache = SchemaCache::new();
        let a = cache.get_or_build(TypeId::of::<First>(), first_schema);
        let b = cache.get_or_build(TypeId::of::<First>(), first_schema);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_never_serves_stale_entry() {
        let cache = SchemaCache::new();
        cache.get_or_build(TypeId::of::<First>(), first_schema);
        let second = cache.get_or_build(TypeId::of::<Second>(), second_schema);
        assert_eq!(second.type_name, std::any::type_name::<Second>());
    }
}
