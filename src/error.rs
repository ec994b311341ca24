use thiserror::Error;

use crate::bind::BindError;
use crate::condition::ConditionError;
use crate::source::SourceError;

/// Top-level error type for the propbind library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("binding error: {0}")]
    Bind(#[from] BindError),

    #[error("property source error: {0}")]
    Source(#[from] SourceError),

    #[error("condition evaluation error: {0}")]
    Condition(#[from] ConditionError),
}
