//! Bind handlers: ordered interceptors around each bind step.
//!
//! Handlers are passed to the binder as an explicit ordered list and invoked
//! in sequence at each stage (start, success, failure, finish), keeping
//! cross-cutting policy such as error suppression, unknown-key rejection
//! and validation out of the core algorithm.

use std::any::Any;
use std::fmt;

use crate::source::{PropertyName, PropertySource};

use super::target::{Bindable, BoxedValue};
use super::{BindContext, BindError};

/// Callback interface invoked around each element bind.
///
/// All methods have no-op defaults; implement only the stages needed.
pub trait BindHandler: Send + Sync {
    /// Called when binding of an element starts, before any result has been
    /// determined. May substitute the target, or veto the bind entirely by
    /// returning `None` (the element is then reported absent, not failed).
    fn on_start(
        &self,
        name: &PropertyName,
        target: Bindable,
        context: &BindContext,
    ) -> Option<Bindable> {
        let _ = (name, context);
        Some(target)
    }

    /// Called when binding produced a value. May transform the value or turn
    /// it into an error.
    fn on_success(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext,
        value: BoxedValue,
    ) -> Result<BoxedValue, BindError> {
        let _ = (name, target, context);
        Ok(value)
    }

    /// Called when binding fails for any reason, including failures raised
    /// by [`on_success`](Self::on_success) stages. May swallow the error and
    /// supply a replacement result (`Ok(None)` for absent), or rethrow.
    fn on_failure(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext,
        error: BindError,
    ) -> Result<Option<BoxedValue>, BindError> {
        let _ = (name, target, context);
        Err(error)
    }

    /// Called when binding finishes, whether or not a value was produced.
    fn on_finish(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext,
        value: Option<&dyn Any>,
    ) -> Result<(), BindError> {
        let _ = (name, target, context, value);
        Ok(())
    }
}

/// Swallows every bind error, reporting the element absent instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreErrorsHandler;

impl BindHandler for IgnoreErrorsHandler {
    fn on_failure(
        &self,
        _name: &PropertyName,
        _target: &Bindable,
        _context: &BindContext,
        _error: BindError,
    ) -> Result<Option<BoxedValue>, BindError> {
        Ok(None)
    }
}

/// Swallows conversion and placeholder errors for individual properties,
/// leaving the rest of the bind intact. Structural errors (read-only
/// conflicts, recursion limits, unknown keys) still propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreInvalidValuesHandler;

impl BindHandler for IgnoreInvalidValuesHandler {
    fn on_failure(
        &self,
        _name: &PropertyName,
        _target: &Bindable,
        _context: &BindContext,
        error: BindError,
    ) -> Result<Option<BoxedValue>, BindError> {
        match error {
            BindError::Parse { .. }
            | BindError::UnresolvedPlaceholder { .. }
            | BindError::UnclosedPlaceholder
            | BindError::PlaceholderCycle => Ok(None),
            other => Err(other),
        }
    }
}

/// Rejects source keys under the bind root that no member or aggregate
/// element consumed.
///
/// Without this handler stray keys are silently ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyUnknownKeysHandler;

impl BindHandler for DenyUnknownKeysHandler {
    fn on_finish(
        &self,
        name: &PropertyName,
        _target: &Bindable,
        context: &BindContext,
        _value: Option<&dyn Any>,
    ) -> Result<(), BindError> {
        // Only the outermost frame sees the full key set.
        if context.depth() != 0 {
            return Ok(());
        }
        for source in context.sources() {
            for descendant in source.descendants(name) {
                if !context.is_consumed(&descendant) {
                    return Err(BindError::UnknownKey {
                        name: descendant.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A single violated validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub message: String,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A pluggable validation rule attached to a [`Bindable`].
pub trait Validator: Send + Sync {
    /// Returns one failure per violated rule; empty means valid.
    fn validate(&self, name: &PropertyName, value: &dyn Any) -> Vec<ValidationFailure>;
}

/// Runs the validators attached to each bound target and escalates any
/// failure to a bind error carrying the full list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationHandler;

impl BindHandler for ValidationHandler {
    fn on_success(
        &self,
        name: &PropertyName,
        target: &Bindable,
        _context: &BindContext,
        value: BoxedValue,
    ) -> Result<BoxedValue, BindError> {
        let mut failures = Vec::new();
        for validator in target.validators() {
            failures.extend(validator.validate(name, value.as_ref()));
        }
        if failures.is_empty() {
            Ok(value)
        } else {
            Err(BindError::Validation {
                name: name.to_string(),
                failures,
            })
        }
    }
}
