pub mod bind;
pub mod condition;
pub mod source;
mod error;

pub use bind::{
    BindError, BindHandler, BindResult, BindTarget, Bindable, Binder, ConverterRegistry,
    StructSchema, Validator,
};
pub use condition::{
    Component, ComponentRegistry, ConditionError, ConditionEvaluator, ConditionOutcome,
    MatchResult, PresenceSpec, SearchScope,
};
pub use error::Error;
pub use source::{
    EnvSource, FileSource, MapSource, Property, PropertyName, PropertySource, SourceError,
};
