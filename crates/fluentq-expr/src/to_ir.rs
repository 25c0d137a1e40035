//! Lowering of a composed query to the IR.
//!
//! The walk drives the clause-mode state machine: each clause pushes its
//! mode, descends the clause expression, and pops (which flushes). Every
//! expression node the walk does not recognize fails with its textual form
//! and kind; nothing ever lowers to a silent default.

use crate::expr::{BinaryOp, Expr, SubQueryOp};
use crate::query::{ComposedQuery, QueryOp, Terminal};
use fluentq_ir::diag::{self, QueryStage};
use fluentq_ir::{
    key_alias_path, key_index_path, AggregationKind, ClauseMode, Collector, ComparisonKind,
    LogicalOp, QueryError, QueryIr, ResultShape, Value,
};

/// Walks `query` and produces its IR.
pub fn lower(query: &ComposedQuery) -> Result<QueryIr, QueryError> {
    let _stage = diag::stage(QueryStage::Parse);
    tracing::debug!(schema = %query.schema, clauses = query.ops.len(), "lowering composition");

    let mut c = Collector::new();
    for op in &query.ops {
        match op {
            QueryOp::Filter(predicate) => {
                c.push_mode(ClauseMode::Filtering);
                visit_filter_clause(&mut c, predicate)?;
                c.pop_mode()?;
            }
            QueryOp::OrderBy { expr, descending } => {
                c.push_mode(ClauseMode::Ordering);
                c.set_sort_direction(*descending)?;
                c.set_column(column_path(expr)?)?;
                c.pop_mode()?;
            }
            QueryOp::GroupBy(key) => {
                c.push_mode(ClauseMode::Grouping);
                visit_group_key(&mut c, key)?;
                c.pop_mode()?;
            }
            QueryOp::Select(projection) => {
                c.push_mode(ClauseMode::Projecting);
                visit_projection(&mut c, projection)?;
                c.pop_mode()?;
            }
            QueryOp::Take(bound) => c.set_take(constant_bound(bound, "take")?),
            QueryOp::Skip(bound) => c.set_skip(constant_bound(bound, "skip")?),
        }
    }

    match &query.terminal {
        None => {}
        Some(Terminal::Count) => c.set_result_aggregation(AggregationKind::Count),
        Some(Terminal::First) => c.set_take(1),
        Some(Terminal::Min(selector)) => terminal_aggregate(&mut c, "Min", selector)?,
        Some(Terminal::Max(selector)) => terminal_aggregate(&mut c, "Max", selector)?,
        Some(Terminal::Avg(selector)) => terminal_aggregate(&mut c, "Average", selector)?,
        Some(Terminal::Sum(selector)) => terminal_aggregate(&mut c, "Sum", selector)?,
    }

    c.finish()
}

fn unsupported(expr: &Expr) -> QueryError {
    QueryError::UnsupportedExpression {
        expr: expr.to_string(),
        kind: expr.kind_name(),
    }
}

/// Lowers one filter clause into its own scope. A top-level connective
/// brings its own scope; anything else is wrapped in a fresh AND scope so a
/// clause-level negation stays confined to the clause that wrote it instead
/// of leaking onto predicates accumulated by earlier clauses. Un-negated
/// clause scopes without nested children fold into the root on pop.
fn visit_filter_clause(c: &mut Collector, expr: &Expr) -> Result<(), QueryError> {
    if let Expr::Binary { op, .. } = expr {
        if op.is_logical() {
            return visit_predicate(c, expr);
        }
    }
    c.push_scope(Some(LogicalOp::And))?;
    visit_predicate(c, expr)?;
    // Also flushes a bare boolean column left pending by the clause.
    c.pop_scope()
}

/// Lowers one filter predicate into the current scope.
fn visit_predicate(c: &mut Collector, expr: &Expr) -> Result<(), QueryError> {
    match expr {
        Expr::Binary { op, left, right } if op.is_logical() => {
            let connective = match op {
                BinaryOp::And => LogicalOp::And,
                _ => LogicalOp::Or,
            };
            c.push_scope(Some(connective))?;
            visit_logical_operand(c, left)?;
            visit_logical_operand(c, right)?;
            c.pop_scope()
        }
        Expr::Binary { op, left, right } => visit_comparison(c, *op, left, right),
        Expr::Not(inner) => {
            c.set_negate()?;
            visit_predicate(c, inner)
        }
        // Bare boolean column; the implicit `= true` predicate is
        // synthesized when the enclosing scope is popped.
        Expr::Column { .. } | Expr::Member { .. } | Expr::Key | Expr::Index { .. } => {
            c.set_column(column_path(expr)?)
        }
        Expr::Call { name, target, args } => {
            if ComparisonKind::for_function(name).is_some() {
                let target = target.as_deref().ok_or_else(|| unsupported(expr))?;
                eval_operand(c, target)?;
                let arg = args.first().map(eval_constant).transpose()?;
                c.set_function(name, arg)
            } else {
                // Aggregates and unknown functions are both rejected, with
                // distinct errors, by the state machine.
                c.set_function(name, None)
            }
        }
        Expr::SubQuery { source, ops } => visit_sub_query(c, source, ops),
        other => Err(unsupported(other)),
    }
}

/// An operand of a logical connective that is not itself a connective gets
/// its own singleton scope, keeping negation scoping correct. The scope
/// inherits the connective so un-negated singletons merge away on pop.
fn visit_logical_operand(c: &mut Collector, expr: &Expr) -> Result<(), QueryError> {
    if let Expr::Binary { op, .. } = expr {
        if op.is_logical() {
            return visit_predicate(c, expr);
        }
    }
    c.push_scope(None)?;
    visit_predicate(c, expr)?;
    c.pop_scope()
}

fn visit_comparison(
    c: &mut Collector,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
) -> Result<(), QueryError> {
    let kind = match op {
        BinaryOp::Eq => ComparisonKind::Equal,
        BinaryOp::Ne => ComparisonKind::NotEqual,
        BinaryOp::Gt => ComparisonKind::Greater,
        BinaryOp::Ge => ComparisonKind::GreaterOrEqual,
        BinaryOp::Lt => ComparisonKind::Less,
        BinaryOp::Le => ComparisonKind::LessOrEqual,
        BinaryOp::And | BinaryOp::Or => {
            return Err(QueryError::IllegalStateTransition {
                state: "Filtering",
                event: "logical connective as comparison",
            })
        }
    };

    let left_value = eval_operand(c, left)?;
    let right_value = eval_operand(c, right)?;

    // Both operand orderings are supported; the column side is whichever
    // operand's string form matches the column the state last recorded.
    // A right-side column mirrors the relational direction.
    let last = c.last_column().map(str::to_string);
    let (kind, value) = match last {
        Some(column)
            if right_value.string_form() == column && left_value.string_form() != column =>
        {
            (mirror(kind), left_value)
        }
        _ => (kind, right_value),
    };

    if value.is_null() {
        return match kind {
            ComparisonKind::Equal => c.set_comparison(ComparisonKind::IsNull, Value::Null),
            ComparisonKind::NotEqual => c.set_comparison(ComparisonKind::IsNotNull, Value::Null),
            other => Err(QueryError::NullComparisonMisuse(other)),
        };
    }
    c.set_comparison(kind, value)
}

/// Swaps the relational direction for `value <op> column` orderings.
fn mirror(kind: ComparisonKind) -> ComparisonKind {
    match kind {
        ComparisonKind::Greater => ComparisonKind::Less,
        ComparisonKind::GreaterOrEqual => ComparisonKind::LessOrEqual,
        ComparisonKind::Less => ComparisonKind::Greater,
        ComparisonKind::LessOrEqual => ComparisonKind::GreaterOrEqual,
        other => other,
    }
}

/// Evaluates a comparison operand to a static value. Column references are
/// recorded in the state machine and yield their path as the value, so the
/// caller can detect which side was the column.
fn eval_operand(c: &mut Collector, expr: &Expr) -> Result<Value, QueryError> {
    match expr {
        Expr::Constant(v) => Ok(v.clone()),
        Expr::Array(_) => eval_constant(expr),
        Expr::Column { .. } | Expr::Member { .. } | Expr::Key | Expr::Index { .. } => {
            let path = column_path(expr)?;
            c.set_column(&path)?;
            Ok(Value::from(path))
        }
        other => Err(unsupported(other)),
    }
}

/// Evaluates an expression that must be constant (no column references).
fn eval_constant(expr: &Expr) -> Result<Value, QueryError> {
    match expr {
        Expr::Constant(v) => Ok(v.clone()),
        Expr::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(eval_constant)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        other => Err(unsupported(other)),
    }
}

/// Resolves a column-reference expression to its dotted path, including
/// the synthetic `Key` paths of grouped queries.
fn column_path(expr: &Expr) -> Result<String, QueryError> {
    match expr {
        Expr::Column { path } => Ok(path.clone()),
        Expr::Key => Ok("Key".to_string()),
        Expr::Member { base, name } => {
            // String length is structural, not a column; there is no
            // backing column it could resolve to.
            if name == "Length" {
                return Err(unsupported(expr));
            }
            match base.as_ref() {
                Expr::Key => Ok(key_alias_path(name)),
                other => Ok(format!("{}.{name}", column_path(other)?)),
            }
        }
        Expr::Index { base, index } => match base.as_ref() {
            Expr::Key => Ok(key_index_path(*index)),
            _ => Err(unsupported(expr)),
        },
        other => Err(unsupported(other)),
    }
}

/// A sub-query over an inline source; its `Contains` result operator is
/// converted into an equality predicate whose set value compiles to an
/// in-set filter.
fn visit_sub_query(
    c: &mut Collector,
    source: &Expr,
    ops: &[SubQueryOp],
) -> Result<(), QueryError> {
    let value = eval_constant(source)?;
    for op in ops {
        match op {
            SubQueryOp::Contains(probe) => {
                c.set_column(column_path(probe)?)?;
                c.set_comparison(ComparisonKind::Equal, value.clone())?;
            }
        }
    }
    Ok(())
}

fn visit_group_key(c: &mut Collector, key: &Expr) -> Result<(), QueryError> {
    match key {
        Expr::New { members, args } => {
            for arg in args {
                c.set_column(column_path(arg)?)?;
            }
            if let Some(names) = members {
                for (position, name) in names.iter().enumerate() {
                    c.set_alias(position, name)?;
                }
            }
            Ok(())
        }
        single => c.set_column(column_path(single)?),
    }
}

fn visit_projection(c: &mut Collector, projection: &Expr) -> Result<(), QueryError> {
    match projection {
        Expr::New { members, args } => {
            for arg in args {
                c.push_element()?;
                visit_projection_element(c, arg)?;
                c.pop_element()?;
            }
            let shape = match members {
                Some(names) => ResultShape::named(names.clone()),
                None => ResultShape::positional(args.len()),
            };
            c.set_result_shape(shape);
            Ok(())
        }
        single => {
            c.push_element()?;
            visit_projection_element(c, single)?;
            c.pop_element()
        }
    }
}

fn visit_projection_element(c: &mut Collector, expr: &Expr) -> Result<(), QueryError> {
    match expr {
        Expr::Column { .. } | Expr::Member { .. } | Expr::Key | Expr::Index { .. } => {
            c.set_column(column_path(expr)?)
        }
        Expr::Call { name, args, .. } if AggregationKind::from_function(name).is_ok() => {
            c.push_mode(ClauseMode::Aggregating);
            if let Some(arg) = args.first() {
                c.set_column(column_path(arg)?)?;
            }
            c.set_function(name, None)?;
            c.pop_mode()
        }
        Expr::New { .. } => Err(QueryError::UnsupportedExpression {
            expr: "nested result element".to_string(),
            kind: "New",
        }),
        other => Err(unsupported(other)),
    }
}

fn constant_bound(expr: &Expr, clause: &'static str) -> Result<i64, QueryError> {
    match expr {
        Expr::Constant(Value::Int(v)) => Ok(*v),
        _ => Err(QueryError::NonConstantBound { clause }),
    }
}

/// Terminal Min/Max/Avg/Sum: project the selector, then collapse the query
/// to one scalar of that kind.
fn terminal_aggregate(
    c: &mut Collector,
    name: &str,
    selector: &Expr,
) -> Result<(), QueryError> {
    c.push_mode(ClauseMode::Projecting);
    c.push_element()?;
    visit_projection_element(c, selector)?;
    c.pop_element()?;
    c.pop_mode()?;
    c.set_function(name, None)
}
