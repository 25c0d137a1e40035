//! Clause-mode state machine driven by the expression visitor.
//!
//! The collector owns the [`QueryIr`] for the duration of the walk and
//! interprets a common event vocabulary according to the active clause
//! mode. Modes form a stack so that nested contexts (an aggregate call
//! argument evaluated inside a projection element, for example) can switch
//! mode transiently and restore the previous one on exit. Events a mode
//! does not support fail fast with [`QueryError::IllegalStateTransition`].

use crate::columns::{GroupColumn, OrderColumn, ResultShape, SelectColumn};
use crate::error::QueryError;
use crate::filter::{FilterPredicate, ScopeId};
use crate::value::Value;
use crate::vocab::{AggregationKind, ComparisonKind, LogicalOp};
use crate::QueryIr;

/// Clause mode requested via [`Collector::push_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseMode {
    Filtering,
    Ordering,
    Projecting,
    Grouping,
    Aggregating,
}

#[derive(Debug)]
enum ClauseState {
    Filtering {
        scope: ScopeId,
        pending_column: Option<String>,
    },
    Ordering {
        descending: bool,
    },
    Projecting {
        fragments: Vec<String>,
        aggregation: Option<AggregationKind>,
    },
    Grouping {
        columns: Vec<GroupColumn>,
    },
    Aggregating {
        column: Option<String>,
        kind: Option<AggregationKind>,
    },
}

impl ClauseState {
    fn name(&self) -> &'static str {
        match self {
            ClauseState::Filtering { .. } => "Filtering",
            ClauseState::Ordering { .. } => "Ordering",
            ClauseState::Projecting { .. } => "Projecting",
            ClauseState::Grouping { .. } => "Grouping",
            ClauseState::Aggregating { .. } => "Aggregating",
        }
    }
}

/// Accumulates query parts while the composed expression tree is walked.
#[derive(Debug)]
pub struct Collector {
    ir: QueryIr,
    stack: Vec<ClauseState>,
    current: ClauseState,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            ir: QueryIr::new(),
            stack: Vec::new(),
            // The walk starts outside any clause; result-level aggregation
            // events land here.
            current: ClauseState::Aggregating {
                column: None,
                kind: None,
            },
        }
    }

    fn illegal(&self, event: &'static str) -> QueryError {
        QueryError::IllegalStateTransition {
            state: self.current.name(),
            event,
        }
    }

    /// Path of the column most recently recorded by the active mode, if
    /// the mode tracks one.
    pub fn last_column(&self) -> Option<&str> {
        match &self.current {
            ClauseState::Filtering { pending_column, .. } => pending_column.as_deref(),
            ClauseState::Aggregating { column, .. } => column.as_deref(),
            _ => None,
        }
    }

    /// Enters a clause mode, saving the current one.
    pub fn push_mode(&mut self, mode: ClauseMode) {
        tracing::trace!(mode = ?mode, "push mode");
        let next = match mode {
            ClauseMode::Filtering => ClauseState::Filtering {
                scope: self.ir.filters.root(),
                pending_column: None,
            },
            ClauseMode::Ordering => ClauseState::Ordering { descending: false },
            ClauseMode::Projecting => ClauseState::Projecting {
                fragments: Vec::new(),
                aggregation: None,
            },
            ClauseMode::Grouping => ClauseState::Grouping {
                columns: Vec::new(),
            },
            ClauseMode::Aggregating => ClauseState::Aggregating {
                column: None,
                kind: None,
            },
        };
        self.stack.push(std::mem::replace(&mut self.current, next));
    }

    /// Leaves the current clause mode, flushing whatever it accumulated
    /// into the IR (or into the restored mode, for transient aggregation).
    pub fn pop_mode(&mut self) -> Result<(), QueryError> {
        tracing::trace!(mode = self.current.name(), "pop mode");
        let previous = self
            .stack
            .pop()
            .ok_or(QueryError::IllegalStateTransition {
                state: "Aggregating",
                event: "pop_mode on empty mode stack",
            })?;
        let finished = std::mem::replace(&mut self.current, previous);
        self.flush_state(finished)
    }

    fn flush_state(&mut self, finished: ClauseState) -> Result<(), QueryError> {
        match finished {
            ClauseState::Projecting {
                fragments,
                aggregation,
            } => Self::flush_projection(&mut self.ir, fragments, aggregation),
            ClauseState::Grouping { columns } => self.ir.groups.extend(columns),
            ClauseState::Aggregating { column, kind } => {
                let Some(kind) = kind else { return Ok(()) };
                match &mut self.current {
                    // Transient aggregation inside a projection element:
                    // the argument column becomes a fragment and the kind
                    // tags the element.
                    ClauseState::Projecting {
                        fragments,
                        aggregation,
                    } => {
                        if let Some(column) = column {
                            fragments.push(column);
                        }
                        *aggregation = Some(kind);
                    }
                    // Outside any clause the whole query collapses to a
                    // scalar.
                    ClauseState::Aggregating { .. } => {
                        self.ir.result_aggregation = Some(kind);
                        if let Some(column) = column {
                            self.ir.select.push(SelectColumn::new(column, None));
                        }
                    }
                    // An aggregate has no meaning inside a filter, order or
                    // group clause.
                    other => {
                        return Err(QueryError::IllegalStateTransition {
                            state: other.name(),
                            event: "merge aggregation",
                        })
                    }
                }
            }
            ClauseState::Filtering { .. } | ClauseState::Ordering { .. } => {}
        }
        Ok(())
    }

    fn flush_projection(
        ir: &mut QueryIr,
        fragments: Vec<String>,
        aggregation: Option<AggregationKind>,
    ) {
        if fragments.is_empty() && aggregation.is_none() {
            return;
        }
        // An aggregation with no fragments keeps an empty path: it means
        // "aggregate of the grouping source" and is rebound by the compiler.
        let path = fragments.join(".");
        ir.select.push(SelectColumn::new(path, aggregation));
    }

    /// Records a column path according to the active clause.
    pub fn set_column(&mut self, path: impl Into<String>) -> Result<(), QueryError> {
        let path = path.into();
        tracing::trace!(column = %path, mode = self.current.name(), "set column");
        match &mut self.current {
            ClauseState::Filtering { pending_column, .. } => {
                *pending_column = Some(path);
            }
            ClauseState::Ordering { descending } => {
                let position = self.ir.orders.len();
                self.ir.orders.push(OrderColumn {
                    path,
                    aggregation: None,
                    descending: *descending,
                    position,
                });
                *descending = false;
            }
            ClauseState::Projecting { fragments, .. } => fragments.push(path),
            ClauseState::Grouping { columns } => {
                let position = columns.len();
                columns.push(GroupColumn::new(position, path));
            }
            ClauseState::Aggregating { column, .. } => *column = Some(path),
        }
        Ok(())
    }

    /// Consumes the pending column and appends a filter predicate.
    pub fn set_comparison(
        &mut self,
        comparison: ComparisonKind,
        value: Value,
    ) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Filtering {
                scope,
                pending_column,
            } => {
                let column = pending_column
                    .take()
                    .ok_or(QueryError::IllegalStateTransition {
                        state: "Filtering",
                        event: "set_comparison without a pending column",
                    })?;
                self.ir
                    .filters
                    .add_predicate(*scope, FilterPredicate::new(column, comparison, value));
                Ok(())
            }
            // Group keys never compile predicates; a stray comparison while
            // grouping is ignored.
            ClauseState::Grouping { .. } => {
                tracing::debug!(?comparison, "comparison ignored while grouping");
                Ok(())
            }
            _ => Err(self.illegal("set_comparison")),
        }
    }

    /// Dispatches a recognized function name: string-pattern predicates in
    /// filter mode, aggregate functions in projection/aggregation modes.
    pub fn set_function(&mut self, name: &str, arg: Option<Value>) -> Result<(), QueryError> {
        if matches!(self.current, ClauseState::Filtering { .. }) {
            return match ComparisonKind::for_function(name) {
                Some(comparison) => self.set_comparison(comparison, arg.unwrap_or(Value::Null)),
                // Aggregates are meaningless in a filter; anything else is
                // an unknown function.
                None if AggregationKind::from_function(name).is_ok() => {
                    Err(QueryError::IllegalStateTransition {
                        state: "Filtering",
                        event: "set_function with an aggregate",
                    })
                }
                None => Err(QueryError::UnsupportedExpression {
                    expr: format!("{name}(..)"),
                    kind: "Call",
                }),
            };
        }
        match &mut self.current {
            ClauseState::Projecting { aggregation, .. } => {
                *aggregation = Some(AggregationKind::from_function(name)?);
                Ok(())
            }
            ClauseState::Aggregating { kind, .. } => {
                *kind = Some(AggregationKind::from_function(name)?);
                Ok(())
            }
            _ => Err(self.illegal("set_function")),
        }
    }

    /// Sets the pending direction for the next order column.
    pub fn set_sort_direction(&mut self, desc: bool) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Ordering { descending } => {
                *descending = desc;
                Ok(())
            }
            _ => Err(self.illegal("set_sort_direction")),
        }
    }

    /// Toggles negation on the current filter scope.
    pub fn set_negate(&mut self) -> Result<(), QueryError> {
        match &self.current {
            ClauseState::Filtering { scope, .. } => {
                self.ir.filters.toggle_negate(*scope);
                Ok(())
            }
            _ => Err(self.illegal("set_negate")),
        }
    }

    /// Attaches a name to a previously added group column.
    pub fn set_alias(&mut self, position: usize, alias: &str) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Grouping { columns } => {
                if alias.is_empty() {
                    return Err(QueryError::IllegalStateTransition {
                        state: "Grouping",
                        event: "set_alias with an empty alias",
                    });
                }
                let column =
                    columns
                        .get_mut(position)
                        .ok_or(QueryError::IllegalStateTransition {
                            state: "Grouping",
                            event: "set_alias for a missing column position",
                        })?;
                column.alias = Some(alias.to_string());
                Ok(())
            }
            _ => Err(self.illegal("set_alias")),
        }
    }

    /// Opens a nested filter scope with the given connective.
    pub fn push_scope(&mut self, op: Option<LogicalOp>) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Filtering { scope, .. } => {
                *scope = self.ir.filters.push_scope(*scope, op);
                Ok(())
            }
            _ => Err(self.illegal("push_scope")),
        }
    }

    /// Closes the current filter scope, merging it into its parent when the
    /// nesting is redundant. A column still pending here was never consumed
    /// by a comparison: it is a bare boolean column, and the implicit
    /// `column = true` predicate is synthesized for it.
    pub fn pop_scope(&mut self) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Filtering {
                scope,
                pending_column,
            } => {
                if let Some(column) = pending_column.take() {
                    self.ir.filters.add_predicate(
                        *scope,
                        FilterPredicate::new(column, ComparisonKind::Equal, Value::Bool(true)),
                    );
                }
                *scope = self.ir.filters.pop_scope(*scope);
                Ok(())
            }
            _ => Err(self.illegal("pop_scope")),
        }
    }

    /// Opens one result element of a projection. A projection element may
    /// not contain another multi-field result element.
    pub fn push_element(&mut self) -> Result<(), QueryError> {
        match &self.current {
            ClauseState::Projecting {
                fragments,
                aggregation,
            } => {
                if !fragments.is_empty() || aggregation.is_some() {
                    return Err(QueryError::UnsupportedExpression {
                        expr: "nested result element".to_string(),
                        kind: "New",
                    });
                }
                Ok(())
            }
            ClauseState::Grouping { .. } => Ok(()),
            _ => Err(self.illegal("push_element")),
        }
    }

    /// Closes a result element, emitting one select column.
    pub fn pop_element(&mut self) -> Result<(), QueryError> {
        match &mut self.current {
            ClauseState::Projecting {
                fragments,
                aggregation,
            } => {
                let fragments = std::mem::take(fragments);
                let aggregation = aggregation.take();
                Self::flush_projection(&mut self.ir, fragments, aggregation);
                Ok(())
            }
            ClauseState::Grouping { .. } => Ok(()),
            _ => Err(self.illegal("pop_element")),
        }
    }

    /// Records the constructor descriptor for shaped results. Ignored while
    /// grouping: a shaped group key contributes aliases, not a shape.
    pub fn set_result_shape(&mut self, shape: ResultShape) {
        if matches!(self.current, ClauseState::Grouping { .. }) {
            return;
        }
        self.ir.result_shape = Some(shape);
    }

    /// Collapses the whole query to one scalar of the given kind.
    pub fn set_result_aggregation(&mut self, kind: AggregationKind) {
        self.ir.result_aggregation = Some(kind);
    }

    pub fn set_take(&mut self, rows: i64) {
        self.ir.take = Some(rows);
    }

    pub fn set_skip(&mut self, rows: i64) {
        self.ir.skip = Some(rows);
    }

    /// Ends the walk: flushes the base state and yields the frozen IR.
    pub fn finish(mut self) -> Result<QueryIr, QueryError> {
        while !self.stack.is_empty() {
            self.pop_mode()?;
        }
        let base = std::mem::replace(
            &mut self.current,
            ClauseState::Aggregating {
                column: None,
                kind: None,
            },
        );
        self.flush_state(base)?;
        Ok(self.ir)
    }
}
