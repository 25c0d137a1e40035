//! Execution engine errors.

use fluentq_ir::QueryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Two values of incompatible types met in a comparison or sort.
    #[error("cannot compare '{left}' with '{right}'")]
    Incomparable { left: String, right: String },

    /// Sum/average over values that are not numeric.
    #[error("column '{column}' holds non-numeric values; cannot aggregate")]
    NonNumericAggregate { column: String },
}
