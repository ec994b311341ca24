//! Aggregate binders: maps, collections and arrays.
//!
//! Given a name known to denote an aggregate, these enumerate the candidate
//! element names under it and recursively bind each element. An aggregate
//! with zero bound elements is absent, not empty, so callers can distinguish
//! "not configured" from "configured empty".

use std::collections::HashSet;
use std::sync::Arc;

use crate::source::{DescendantState, PropertyName, PropertySource};

use super::placeholder::PlaceholderResolver;
use super::target::{Bindable, BoxedValue, ListAssembler, MapAssembler, Shape};
use super::{BindContext, BindError, BindHandler, Binder};

impl Binder {
    /// Binds a map by enumerating child keys across all sources in
    /// precedence order. Keys are merged additively: a lower-precedence
    /// source contributes the keys the higher ones don't have, while each
    /// individual key is bound against the source that first declared it.
    pub(crate) fn bind_map_aggregate(
        &self,
        name: &PropertyName,
        element: fn() -> Bindable,
        assemble: MapAssembler,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
    ) -> Result<Option<BoxedValue>, BindError> {
        context.increase_depth(name)?;
        let result = self.bind_map_entries(name, element, assemble, handlers, context);
        context.decrease_depth();
        result
    }

    fn bind_map_entries(
        &self,
        name: &PropertyName,
        element: fn() -> Bindable,
        assemble: MapAssembler,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
    ) -> Result<Option<BoxedValue>, BindError> {
        let sources = context.sources().to_vec();
        let mut seen = HashSet::new();
        let mut entries: Vec<(String, BoxedValue)> = Vec::new();

        for source in sources {
            for descendant in source.descendants(name) {
                let Some(child) = descendant.element(name.num_elements()) else {
                    continue;
                };
                let child = child.clone();
                if !seen.insert(child.clone()) {
                    continue;
                }
                let child_name = name.append_element(&child);
                context.push_source(Arc::clone(&source));
                let bound = self.bind_value(&child_name, (element)(), handlers, context, true);
                context.pop_source();
                if let Some(value) = bound? {
                    entries.push((child.map_key(), value));
                }
            }
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(assemble(entries)))
        }
    }

    /// Binds a collection or array by enumerating `name[0]`, `name[1]`, …
    /// contiguously. Unlike maps, indexed aggregates do not merge across
    /// sources: the first source holding the name (or any index under it)
    /// supplies the whole aggregate.
    pub(crate) fn bind_indexed_aggregate(
        &self,
        name: &PropertyName,
        element: fn() -> Bindable,
        assemble: ListAssembler,
        aggregate_type: &'static str,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
    ) -> Result<Option<BoxedValue>, BindError> {
        context.increase_depth(name)?;
        let result =
            self.bind_indexed_entries(name, element, assemble, aggregate_type, handlers, context);
        context.decrease_depth();
        result
    }

    fn bind_indexed_entries(
        &self,
        name: &PropertyName,
        element: fn() -> Bindable,
        assemble: ListAssembler,
        aggregate_type: &'static str,
        handlers: &[Arc<dyn BindHandler>],
        context: &mut BindContext,
    ) -> Result<Option<BoxedValue>, BindError> {
        let sources = context.sources().to_vec();

        for source in sources {
            let literal = source.get(name);
            let has_children = source.descendant_state(name) == DescendantState::Present;
            if literal.is_none() && !has_children {
                continue;
            }

            let mut items: Vec<BoxedValue> = Vec::new();
            let mut index = 0;
            loop {
                let child_name = name.append_index(index);
                let present = source.get(&child_name).is_some()
                    || source.descendant_state(&child_name) == DescendantState::Present;
                if !present {
                    // Stop at the first gap; trailing indices are ignored.
                    break;
                }
                context.push_source(Arc::clone(&source));
                let bound = self.bind_value(&child_name, (element)(), handlers, context, true);
                context.pop_source();
                match bound? {
                    Some(value) => items.push(value),
                    None => break,
                }
                index += 1;
            }

            if items.is_empty() {
                let Some(property) = literal else {
                    return Ok(None);
                };
                // Fallback encoding: a comma-delimited literal at the name
                // itself, for small lists of scalars.
                context.record_consumed(name);
                context.set_last_property(property.clone());
                let resolver = PlaceholderResolver::new(&self.sources);
                let resolved = resolver.resolve(name, &property.value)?;
                let items = self.bind_comma_list(&resolved, element, aggregate_type)?;
                return Ok(Some(assemble(items)));
            }

            return Ok(Some(assemble(items)));
        }

        Ok(None)
    }

    fn bind_comma_list(
        &self,
        resolved: &str,
        element: fn() -> Bindable,
        aggregate_type: &'static str,
    ) -> Result<Vec<BoxedValue>, BindError> {
        let Shape::Scalar { id, type_name } = (element)().shape() else {
            return Err(BindError::NoConverter {
                type_name: aggregate_type,
            });
        };
        if resolved.trim().is_empty() {
            // An explicitly empty literal is a configured-empty list.
            return Ok(Vec::new());
        }
        resolved
            .split(',')
            .map(|piece| self.converters.convert_to(id, type_name, piece.trim()))
            .collect()
    }
}
