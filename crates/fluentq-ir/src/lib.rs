//! fluentq intermediate representation (IR)
//!
//! Clause-tagged record of a composed query prior to lowering. The IR is
//! built by a single walk of the composed expression tree (see the
//! `fluentq-expr` crate), frozen, and handed to the compiler in
//! [`compile`]. All types serialize deterministically so an IR can be
//! fingerprinted for caching and provenance.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod columns;
pub mod compile;
pub mod diag;
mod error;
mod filter;
mod state;
mod value;
mod vocab;

pub use columns::{key_alias_path, key_index_path, GroupColumn, OrderColumn, ResultShape, SelectColumn};
pub use error::QueryError;
pub use filter::{FilterPredicate, FilterScope, FilterTree, ScopeId};
pub use state::{ClauseMode, Collector};
pub use value::{Value, ValueType};
pub use vocab::{AggregationKind, ComparisonKind, LogicalOp, SortDirection};

/// Accumulated parts of one composed query.
///
/// Created empty per composition, mutated exclusively through the
/// [`Collector`] during the walk, then read-only from the moment
/// compilation begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryIr {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<SelectColumn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<OrderColumn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupColumn>,

    #[serde(default)]
    pub filters: FilterTree,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,

    /// Arity and argument order for building shaped result values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_shape: Option<ResultShape>,

    /// Set when the whole query collapses to a single scalar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_aggregation: Option<AggregationKind>,
}

impl QueryIr {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 fingerprint over the canonical JSON form, for deterministic
    /// caching.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("IR should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
