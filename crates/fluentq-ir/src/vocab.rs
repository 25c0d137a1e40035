//! Clause-neutral comparison and aggregation vocabulary.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied by a single filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonKind {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl ComparisonKind {
    /// Maps a string-pattern predicate function name to its comparison kind.
    /// Only `Contains`, `StartsWith` and `EndsWith` are recognized.
    pub fn for_function(name: &str) -> Option<ComparisonKind> {
        match name {
            "Contains" => Some(ComparisonKind::Contains),
            "StartsWith" => Some(ComparisonKind::StartsWith),
            "EndsWith" => Some(ComparisonKind::EndsWith),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Aggregation function applied to a column or to the whole result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    Count,
    Min,
    Max,
    Avg,
    Sum,
}

impl AggregationKind {
    /// Maps an aggregate function name (case-insensitive) to its kind.
    /// `Average` and `Avg` are both accepted.
    pub fn from_function(name: &str) -> Result<AggregationKind, QueryError> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregationKind::Count),
            "min" => Ok(AggregationKind::Min),
            "max" => Ok(AggregationKind::Max),
            "avg" | "average" => Ok(AggregationKind::Avg),
            "sum" => Ok(AggregationKind::Sum),
            _ => Err(QueryError::InvalidAggregationUsage(format!(
                "aggregation function '{name}' is not supported"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Count => "count",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Avg => "avg",
            AggregationKind::Sum => "sum",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical connective of a filter scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl Default for LogicalOp {
    fn default() -> Self {
        LogicalOp::And
    }
}

/// Sort direction of a compiled order column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}
