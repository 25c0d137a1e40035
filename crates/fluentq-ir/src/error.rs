//! Error types for query lowering and compilation.

use crate::vocab::ComparisonKind;
use thiserror::Error;

/// Failures raised while walking a composed query or compiling its IR.
/// All variants are fatal; the pipeline never retries or recovers.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The visitor met an expression shape it does not recognize. Never
    /// silently defaulted.
    #[error("the expression '{expr}' (kind: {kind}) is not supported by this query provider")]
    UnsupportedExpression { expr: String, kind: &'static str },

    /// An event was sent to a clause-mode state that does not support it.
    /// Indicates a composition the builder should have made impossible.
    #[error("state '{state}' does not support event '{event}'")]
    IllegalStateTransition {
        state: &'static str,
        event: &'static str,
    },

    /// More than one column selected with no result-shape descriptor.
    #[error("{0} columns selected without a result shape; output shape is ambiguous")]
    AmbiguousOutputShape(usize),

    #[error("invalid aggregation usage: {0}")]
    InvalidAggregationUsage(String),

    /// A null operand paired with a comparison other than equal/not-equal.
    #[error("cannot apply {0} operator to a null argument")]
    NullComparisonMisuse(ComparisonKind),

    /// A take/skip bound that is not a compile-time constant.
    #[error("{clause} bound must be an integer constant")]
    NonConstantBound { clause: &'static str },

    /// Raised by the external schema resolver.
    #[error("schema error: {0}")]
    Schema(String),
}
