//! Column fragments accumulated by the clause-mode state machine.

use crate::vocab::AggregationKind;
use serde::{Deserialize, Serialize};

/// Synthetic path under which an array-style group key element is
/// referenced by position, e.g. `Key/0`.
pub fn key_index_path(position: usize) -> String {
    format!("Key/{position}")
}

/// Synthetic path under which an object-style group key field is referenced
/// by name, e.g. `Key/Category`.
pub fn key_alias_path(alias: &str) -> String {
    format!("Key/{alias}")
}

/// A column selected into the query output.
///
/// Identity key is `(path, aggregation)`: two select columns with the same
/// key share one resolved backing column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
    /// Backing column name, filled in by the compiler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,
}

impl SelectColumn {
    pub fn new(path: impl Into<String>, aggregation: Option<AggregationKind>) -> Self {
        Self {
            path: path.into(),
            aggregation,
            resolved_name: None,
        }
    }
}

/// One key of the (stable, multi-key) sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderColumn {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
    pub descending: bool,
    /// Tie-break position within the overall ordering.
    pub position: usize,
}

/// One component of the grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupColumn {
    pub path: String,
    /// Ordinal of this component in the grouping key.
    pub position: usize,
    /// Field name when the key is an object with named fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl GroupColumn {
    pub fn new(position: usize, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            position,
            alias: None,
        }
    }
}

/// Constructor descriptor for shaped results: arity plus argument order,
/// optionally with the member names of the shaped element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultShape {
    pub arity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl ResultShape {
    pub fn positional(arity: usize) -> Self {
        Self {
            arity,
            members: None,
        }
    }

    pub fn named(members: Vec<String>) -> Self {
        Self {
            arity: members.len(),
            members: Some(members),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_paths() {
        assert_eq!(key_index_path(1), "Key/1");
        assert_eq!(key_alias_path("Category"), "Key/Category");
    }
}
