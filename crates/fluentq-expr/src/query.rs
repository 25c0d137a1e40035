//! Fluent query builder.
//!
//! `query(schema)` opens a [`SchemaQuery`]; chained clause methods append
//! operators, terminal methods seal the composition. Nothing is validated
//! at build time; validation happens when the composition is lowered to an
//! IR.

use crate::expr::Expr;
use crate::to_ir;
use fluentq_ir::{QueryError, QueryIr};

/// One clause of a composed query, in application order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    Filter(Expr),
    OrderBy { expr: Expr, descending: bool },
    GroupBy(Expr),
    Select(Expr),
    Take(Expr),
    Skip(Expr),
}

/// Terminal operator that seals a composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Count,
    First,
    Min(Expr),
    Max(Expr),
    Avg(Expr),
    Sum(Expr),
}

/// A sealed composition ready for lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub schema: String,
    pub ops: Vec<QueryOp>,
    pub terminal: Option<Terminal>,
}

impl ComposedQuery {
    /// Walks the composition and produces the query IR.
    pub fn to_ir(&self) -> Result<QueryIr, QueryError> {
        to_ir::lower(self)
    }
}

/// Opens a query against a named schema.
pub fn query(schema: impl Into<String>) -> SchemaQuery {
    SchemaQuery {
        inner: ComposedQuery {
            schema: schema.into(),
            ops: Vec::new(),
            terminal: None,
        },
    }
}

/// Builder over a [`ComposedQuery`].
#[derive(Debug, Clone)]
pub struct SchemaQuery {
    inner: ComposedQuery,
}

impl SchemaQuery {
    fn push(mut self, op: QueryOp) -> Self {
        self.inner.ops.push(op);
        self
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.push(QueryOp::Filter(predicate))
    }

    pub fn order_by(self, expr: Expr) -> Self {
        self.push(QueryOp::OrderBy {
            expr,
            descending: false,
        })
    }

    pub fn order_by_desc(self, expr: Expr) -> Self {
        self.push(QueryOp::OrderBy {
            expr,
            descending: true,
        })
    }

    pub fn group_by(self, key: Expr) -> Self {
        self.push(QueryOp::GroupBy(key))
    }

    pub fn select(self, projection: Expr) -> Self {
        self.push(QueryOp::Select(projection))
    }

    /// Row-count bound; must lower to an integer constant.
    pub fn take(self, bound: Expr) -> Self {
        self.push(QueryOp::Take(bound))
    }

    pub fn skip(self, bound: Expr) -> Self {
        self.push(QueryOp::Skip(bound))
    }

    /// Seals the composition without a terminal operator.
    pub fn build(self) -> ComposedQuery {
        self.inner
    }

    fn seal(mut self, terminal: Terminal) -> ComposedQuery {
        self.inner.terminal = Some(terminal);
        self.inner
    }

    pub fn count(self) -> ComposedQuery {
        self.seal(Terminal::Count)
    }

    pub fn first(self) -> ComposedQuery {
        self.seal(Terminal::First)
    }

    pub fn min(self, selector: Expr) -> ComposedQuery {
        self.seal(Terminal::Min(selector))
    }

    pub fn max(self, selector: Expr) -> ComposedQuery {
        self.seal(Terminal::Max(selector))
    }

    pub fn avg(self, selector: Expr) -> ComposedQuery {
        self.seal(Terminal::Avg(selector))
    }

    pub fn sum(self, selector: Expr) -> ComposedQuery {
        self.seal(Terminal::Sum(selector))
    }
}
