//! Hierarchical AND/OR filter tree.
//!
//! Scopes live in an arena indexed by [`ScopeId`]; ownership flows from the
//! root down, and the parent link is a plain back-index used only while the
//! walk is in progress. A child scope that is not negated, has no children
//! and shares its parent's logical operator is folded into the parent on
//! pop, so redundant nesting never survives the walk.

use crate::value::Value;
use crate::vocab::{ComparisonKind, LogicalOp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One leaf comparison in the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column: String,
    pub comparison: ComparisonKind,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(column: impl Into<String>, comparison: ComparisonKind, value: Value) -> Self {
        Self {
            column: column.into(),
            comparison,
            value,
        }
    }
}

/// Index of a scope within its [`FilterTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A node in the filter tree.
#[derive(Debug, Clone)]
pub struct FilterScope {
    pub negate: bool,
    pub op: LogicalOp,
    pub predicates: Vec<FilterPredicate>,
    pub children: Vec<ScopeId>,
    parent: Option<ScopeId>,
}

impl FilterScope {
    fn new(op: LogicalOp, parent: Option<ScopeId>) -> Self {
        Self {
            negate: false,
            op,
            predicates: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    /// True if the scope holds no predicates and no nested scopes.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FilterTree {
    scopes: Vec<FilterScope>,
}

impl Default for FilterTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![FilterScope::new(LogicalOp::And, None)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &FilterScope {
        &self.scopes[id.0]
    }

    pub fn add_predicate(&mut self, id: ScopeId, predicate: FilterPredicate) {
        self.scopes[id.0].predicates.push(predicate);
    }

    /// Flips the negation flag, so a doubled negation cancels out.
    pub fn toggle_negate(&mut self, id: ScopeId) {
        let scope = &mut self.scopes[id.0];
        scope.negate = !scope.negate;
    }

    pub fn set_op(&mut self, id: ScopeId, op: LogicalOp) {
        self.scopes[id.0].op = op;
    }

    /// Opens a nested scope under `parent` and returns it. The new scope
    /// inherits the parent's logical operator unless one is given.
    pub fn push_scope(&mut self, parent: ScopeId, op: Option<LogicalOp>) -> ScopeId {
        let op = op.unwrap_or(self.scopes[parent.0].op);
        let id = ScopeId(self.scopes.len());
        self.scopes.push(FilterScope::new(op, Some(parent)));
        self.scopes[parent.0].children.push(id);
        id
    }

    /// Closes `id` and returns the scope that becomes current. If the child
    /// qualifies for merging its predicates are spliced into the parent and
    /// the child is detached; otherwise it stays as a permanent nested
    /// group. Popping the root is a no-op.
    pub fn pop_scope(&mut self, id: ScopeId) -> ScopeId {
        let Some(parent) = self.scopes[id.0].parent else {
            return id;
        };

        if !self.can_merge(id, parent) {
            return parent;
        }

        let moved = std::mem::take(&mut self.scopes[id.0].predicates);
        self.scopes[id.0].parent = None;
        self.scopes[parent.0].predicates.extend(moved);
        self.scopes[parent.0].children.retain(|c| *c != id);
        parent
    }

    fn can_merge(&self, id: ScopeId, parent: ScopeId) -> bool {
        let scope = &self.scopes[id.0];
        !scope.negate && scope.children.is_empty() && scope.op == self.scopes[parent.0].op
    }

    /// Total predicate count across the reachable tree.
    pub fn predicate_count(&self) -> usize {
        self.count_from(self.root())
    }

    fn count_from(&self, id: ScopeId) -> usize {
        let scope = self.scope(id);
        scope.predicates.len()
            + scope
                .children
                .iter()
                .map(|c| self.count_from(*c))
                .sum::<usize>()
    }

    fn to_node(&self, id: ScopeId) -> FilterNode {
        let scope = self.scope(id);
        FilterNode {
            negate: scope.negate,
            op: scope.op,
            predicates: scope.predicates.clone(),
            children: scope.children.iter().map(|c| self.to_node(*c)).collect(),
        }
    }

    fn from_node(&mut self, parent: Option<ScopeId>, node: FilterNode) {
        let id = match parent {
            None => self.root(),
            Some(p) => self.push_scope(p, Some(node.op)),
        };
        self.scopes[id.0].negate = node.negate;
        self.scopes[id.0].op = node.op;
        self.scopes[id.0].predicates = node.predicates;
        for child in node.children {
            self.from_node(Some(id), child);
        }
    }
}

/// Serialized (hierarchical) form of a filter scope. Detached arena slots
/// left behind by merges are not part of this representation.
#[derive(Debug, Serialize, Deserialize)]
struct FilterNode {
    negate: bool,
    op: LogicalOp,
    predicates: Vec<FilterPredicate>,
    children: Vec<FilterNode>,
}

impl Serialize for FilterTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_node(self.root()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let node = FilterNode::deserialize(deserializer)?;
        let mut tree = FilterTree::new();
        tree.from_node(None, node);
        Ok(tree)
    }
}
