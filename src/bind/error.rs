use thiserror::Error;

use crate::source::{InvalidNameError, Property};

use super::handler::ValidationFailure;

/// Errors raised while binding properties to a target.
///
/// Absence is not an error: an unconfigured name yields
/// [`BindResult::Unbound`](super::BindResult::Unbound) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindError {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error("no converter registered for type {type_name}")]
    NoConverter { type_name: &'static str },

    #[error("failed to parse '{value}' as {type_name}: {reason}")]
    Parse {
        type_name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unresolved placeholder '${{{key}}}' in property '{name}'")]
    UnresolvedPlaceholder { name: String, key: String },

    #[error("placeholder resolution did not converge (reference cycle?)")]
    PlaceholderCycle,

    #[error("unclosed placeholder (missing '}}')")]
    UnclosedPlaceholder,

    #[error("cannot rebind read-only member '{member}' of {type_name} to a different value")]
    UnsettableMember {
        type_name: &'static str,
        member: String,
    },

    #[error("unknown configuration key '{name}'")]
    UnknownKey { name: String },

    #[error("validation failed for '{name}' ({count} violation(s))", count = .failures.len())]
    Validation {
        name: String,
        failures: Vec<ValidationFailure>,
    },

    #[error("binding '{name}' exceeded the recursion limit of {limit}")]
    RecursionLimit { name: String, limit: usize },

    #[error("failed to bind '{name}' to {type_name}: {source}")]
    Failed {
        name: String,
        type_name: &'static str,
        /// The last property located before the failure, if any.
        property: Option<Property>,
        source: Box<BindError>,
    },
}
