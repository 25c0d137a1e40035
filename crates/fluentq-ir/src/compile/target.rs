//! Compiled target query model and result projection.
//!
//! This is the boundary handed to an execution engine: a flat list of
//! resolved columns, a nested filter tree over backing names, paging
//! bounds, and a projector that shapes raw rows into result values.

use crate::columns::ResultShape;
use crate::value::Value;
use crate::vocab::{AggregationKind, ComparisonKind, LogicalOp, SortDirection};
use serde::{Deserialize, Serialize};

/// One resolved output (or grouping-only) column of a compiled query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetColumn {
    /// Name the column's value is published under in result rows.
    pub output_name: String,
    /// Backing column in the target model; empty for a whole-source count.
    pub backing_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
    /// Part of the grouping key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub grouped: bool,
    /// Sequence position and direction when the column is ordered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<(u32, SortDirection)>,
}

/// Right-hand side of a compiled comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Null tests carry no operand.
    None,
    Scalar(Value),
    /// Membership test against a set of scalars.
    Set(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetFilterItem {
    Comparison {
        backing_name: String,
        comparison: ComparisonKind,
        operand: Operand,
    },
    Group(TargetFilterGroup),
}

/// Nested AND/OR/NOT group of compiled filter terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFilterGroup {
    pub op: LogicalOp,
    pub negate: bool,
    pub items: Vec<TargetFilterItem>,
}

impl TargetFilterGroup {
    pub fn empty() -> Self {
        Self {
            op: LogicalOp::And,
            negate: false,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fully compiled query against one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetQuery {
    pub schema: String,
    pub columns: Vec<TargetColumn>,
    pub filter: TargetFilterGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
}

impl TargetQuery {
    pub fn column(&self, output_name: &str) -> Option<&TargetColumn> {
        self.columns.iter().find(|c| c.output_name == output_name)
    }

    /// Columns forming the grouping key, in declaration order.
    pub fn grouped_columns(&self) -> impl Iterator<Item = &TargetColumn> {
        self.columns.iter().filter(|c| c.grouped)
    }

    pub fn is_grouped(&self) -> bool {
        self.columns.iter().any(|c| c.grouped)
    }
}

/// Read access to one result row by output column name. Implemented by the
/// execution engine's record type; keeps projection decoupled from storage.
pub trait ColumnValues {
    fn value(&self, column: &str) -> Option<Value>;
}

/// Result of applying a [`Projector`] to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected {
    /// Pass the row through unchanged.
    Row,
    Scalar(Value),
    /// Constructor arguments of a shaped result element, in declaration
    /// order.
    Shaped(Vec<Value>),
}

/// Compiled result-projection function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projector {
    /// No shape and no selected columns: rows come back whole.
    Row,
    /// Single selected column or overall aggregate.
    Scalar { column: String },
    /// One value per shaped constructor argument.
    Shaped {
        columns: Vec<String>,
        shape: ResultShape,
    },
}

impl Projector {
    /// Shapes one row. Missing columns project as null; the engine decides
    /// whether that is acceptable for its storage model.
    pub fn apply(&self, row: &dyn ColumnValues) -> Projected {
        match self {
            Projector::Row => Projected::Row,
            Projector::Scalar { column } => {
                Projected::Scalar(row.value(column).unwrap_or(Value::Null))
            }
            Projector::Shaped { columns, .. } => Projected::Shaped(
                columns
                    .iter()
                    .map(|c| row.value(c).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

/// Output of [`super::QueryCompiler::compile`]: the target query plus the
/// projection that turns its rows into caller-visible results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub query: TargetQuery,
    pub projector: Projector,
}
