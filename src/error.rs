//! Crate error type.
//!
//! All failures in this crate are local and synchronous: they are returned
//! at the offending call and never retried internally. The planning layer
//! above decides whether a failure aborts the cycle or is skipped.

use crate::models::TaskId;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by the planning core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A value could not be constructed: incompatible kind, non-finite
    /// number, or an aspect code outside a lookup table.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An operation was applied to something that does not support it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Aggregations, parent tasks and distributions disagree.
    #[error("inconsistent composition: {0}")]
    InconsistentComposition(String),

    /// A task referenced by id could not be resolved.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// An aspect type code has no registered factory.
    #[error("unknown aspect type: {0}")]
    UnknownAspectType(i32),
}

impl Error {
    pub(crate) fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentComposition(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::invalid_value("NaN is not a COST");
        assert_eq!(e.to_string(), "invalid value: NaN is not a COST");

        let e = Error::UnknownTask(TaskId::new("T9"));
        assert_eq!(e.to_string(), "unknown task: T9");

        let e = Error::UnknownAspectType(99);
        assert_eq!(e.to_string(), "unknown aspect type: 99");
    }
}
