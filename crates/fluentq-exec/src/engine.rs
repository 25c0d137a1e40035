//! In-memory evaluation of compiled queries.
//!
//! The executor works on a slice of [`Record`]s: it applies the compiled
//! filter tree, then grouping / overall aggregation / plain row selection,
//! then the sort order and paging bounds, and finally the projector. It is
//! meant for tests and demos; a production backend would translate the
//! [`TargetQuery`] into its own query language instead.

use crate::error::ExecutionError;
use crate::record::Record;
use fluentq_ir::compile::{
    ColumnValues, CompiledQuery, Operand, Projected, TargetColumn, TargetFilterGroup,
    TargetFilterItem, TargetQuery,
};
use fluentq_ir::diag::{self, QueryStage};
use fluentq_ir::{AggregationKind, ComparisonKind, LogicalOp, SortDirection, Value};
use std::cmp::Ordering;

/// One result row after projection.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutput {
    Row(Record),
    Scalar(Value),
    Shaped(Vec<Value>),
}

impl RowOutput {
    /// The scalar payload, for results known to be scalar-projected.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            RowOutput::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

pub struct MemoryExecutor;

impl MemoryExecutor {
    pub fn execute(
        compiled: &CompiledQuery,
        rows: &[Record],
    ) -> Result<Vec<RowOutput>, ExecutionError> {
        let _stage = diag::stage(QueryStage::Execute);
        let query = &compiled.query;

        let mut kept: Vec<&Record> = Vec::new();
        for row in rows {
            if eval_group(&query.filter, row)? {
                kept.push(row);
            }
        }
        tracing::debug!(input = rows.len(), kept = kept.len(), "filter applied");

        let mut output: Vec<Record> = if query.is_grouped() {
            group_rows(query, &kept)?
        } else if query.columns.iter().any(|c| c.aggregation.is_some()) {
            vec![aggregate_all(query, &kept)?]
        } else {
            // Plain rows pass through whole; output names of plain columns
            // equal their backing names, so ordering and projection read
            // straight from the source record.
            kept.into_iter().cloned().collect()
        };

        sort_output(query, &mut output)?;
        let output = page(output, query.skip, query.take);

        Ok(output
            .into_iter()
            .map(|record| match compiled.projector.apply(&record) {
                Projected::Row => RowOutput::Row(record),
                Projected::Scalar(v) => RowOutput::Scalar(v),
                Projected::Shaped(values) => RowOutput::Shaped(values),
            })
            .collect())
    }
}

fn eval_group(group: &TargetFilterGroup, row: &Record) -> Result<bool, ExecutionError> {
    if group.items.is_empty() {
        return Ok(!group.negate);
    }
    let mut outcome = matches!(group.op, LogicalOp::And);
    for item in &group.items {
        let matched = match item {
            TargetFilterItem::Comparison {
                backing_name,
                comparison,
                operand,
            } => eval_comparison(row, backing_name, *comparison, operand)?,
            TargetFilterItem::Group(sub) => eval_group(sub, row)?,
        };
        match group.op {
            LogicalOp::And => outcome &= matched,
            LogicalOp::Or => outcome |= matched,
        }
    }
    Ok(outcome != group.negate)
}

fn eval_comparison(
    row: &Record,
    backing_name: &str,
    comparison: ComparisonKind,
    operand: &Operand,
) -> Result<bool, ExecutionError> {
    let actual = row.value(backing_name).unwrap_or(Value::Null);
    match comparison {
        ComparisonKind::IsNull => return Ok(actual.is_null()),
        ComparisonKind::IsNotNull => return Ok(!actual.is_null()),
        _ => {}
    }
    // SQL-style: null never satisfies a value comparison.
    if actual.is_null() {
        return Ok(false);
    }
    match operand {
        Operand::None => Ok(false),
        Operand::Scalar(expected) => match comparison {
            ComparisonKind::Equal => Ok(values_equal(&actual, expected)),
            ComparisonKind::NotEqual => Ok(!values_equal(&actual, expected)),
            ComparisonKind::Greater => Ok(compare_values(&actual, expected)? == Ordering::Greater),
            ComparisonKind::GreaterOrEqual => {
                Ok(compare_values(&actual, expected)? != Ordering::Less)
            }
            ComparisonKind::Less => Ok(compare_values(&actual, expected)? == Ordering::Less),
            ComparisonKind::LessOrEqual => {
                Ok(compare_values(&actual, expected)? != Ordering::Greater)
            }
            ComparisonKind::Contains => Ok(actual
                .string_form()
                .contains(&expected.string_form())),
            ComparisonKind::StartsWith => Ok(actual
                .string_form()
                .starts_with(&expected.string_form())),
            ComparisonKind::EndsWith => Ok(actual
                .string_form()
                .ends_with(&expected.string_form())),
            ComparisonKind::IsNull | ComparisonKind::IsNotNull => Ok(false),
        },
        Operand::Set(items) => {
            let member = items.iter().any(|item| values_equal(&actual, item));
            match comparison {
                ComparisonKind::NotEqual => Ok(!member),
                _ => Ok(member),
            }
        }
    }
}

/// Loose equality: values of incompatible types are simply not equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    matches!(compare_values(a, b), Ok(Ordering::Equal))
}

/// Strict ordering over the scalar value types; numeric kinds compare
/// across Int/Float, everything else only within its own type.
fn compare_values(a: &Value, b: &Value) -> Result<Ordering, ExecutionError> {
    let incomparable = || ExecutionError::Incomparable {
        left: a.string_form(),
        right: b.string_form(),
    };
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).ok_or_else(incomparable),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).ok_or_else(incomparable),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).ok_or_else(incomparable),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Uuid(x), Value::Uuid(y)) => Ok(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable()),
    }
}

fn group_rows(query: &TargetQuery, rows: &[&Record]) -> Result<Vec<Record>, ExecutionError> {
    let grouped: Vec<&TargetColumn> = query.grouped_columns().collect();

    // First-seen group order; key equality over the grouped values.
    let mut groups: Vec<(Vec<Value>, Vec<&Record>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = grouped
            .iter()
            .map(|c| row.value(&c.backing_name).unwrap_or(Value::Null))
            .collect();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    tracing::debug!(groups = groups.len(), "grouping applied");

    let mut output = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut record = Record::new();
        for (column, value) in grouped.iter().zip(key) {
            record.set(column.output_name.as_str(), value);
        }
        for column in &query.columns {
            if let Some(kind) = column.aggregation {
                record.set(
                    column.output_name.as_str(),
                    aggregate(kind, column, &members)?,
                );
            }
        }
        output.push(record);
    }
    Ok(output)
}

/// Collapses the whole filtered set into a single record of aggregates.
fn aggregate_all(query: &TargetQuery, rows: &[&Record]) -> Result<Record, ExecutionError> {
    let mut record = Record::new();
    for column in &query.columns {
        if let Some(kind) = column.aggregation {
            record.set(column.output_name.as_str(), aggregate(kind, column, rows)?);
        }
    }
    Ok(record)
}

fn aggregate(
    kind: AggregationKind,
    column: &TargetColumn,
    rows: &[&Record],
) -> Result<Value, ExecutionError> {
    // An empty backing name counts source rows rather than column values.
    if column.backing_name.is_empty() {
        return Ok(Value::Int(rows.len() as i64));
    }
    let values: Vec<Value> = rows
        .iter()
        .filter_map(|r| r.value(&column.backing_name))
        .filter(|v| !v.is_null())
        .collect();

    match kind {
        AggregationKind::Count => Ok(Value::Int(values.len() as i64)),
        AggregationKind::Min | AggregationKind::Max => {
            let mut best: Option<&Value> = None;
            for value in &values {
                best = Some(match best {
                    None => value,
                    Some(current) => {
                        let ordering = compare_values(value, current)?;
                        let replace = match kind {
                            AggregationKind::Min => ordering == Ordering::Less,
                            _ => ordering == Ordering::Greater,
                        };
                        if replace {
                            value
                        } else {
                            current
                        }
                    }
                });
            }
            Ok(best.cloned().unwrap_or(Value::Null))
        }
        AggregationKind::Sum => numeric_sum(&values, column).map(|s| s.unwrap_or(Value::Null)),
        AggregationKind::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let total: f64 = values
                .iter()
                .map(|v| {
                    numeric(v).ok_or_else(|| ExecutionError::NonNumericAggregate {
                        column: column.backing_name.clone(),
                    })
                })
                .sum::<Result<f64, _>>()?;
            Ok(Value::Float(total / values.len() as f64))
        }
    }
}

/// Integer inputs sum to an integer; any float makes the sum a float.
fn numeric_sum(values: &[Value], column: &TargetColumn) -> Result<Option<Value>, ExecutionError> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for value in values {
        match value {
            Value::Int(v) => {
                int_total += v;
                float_total += *v as f64;
            }
            Value::Float(v) => {
                saw_float = true;
                float_total += v;
            }
            _ => {
                return Err(ExecutionError::NonNumericAggregate {
                    column: column.backing_name.clone(),
                })
            }
        }
    }
    Ok(Some(if saw_float {
        Value::Float(float_total)
    } else {
        Value::Int(int_total)
    }))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

/// Stable multi-key sort by the ordered columns, in sequence position.
/// Nulls sort first. Mixed incomparable types are rejected up front.
fn sort_output(query: &TargetQuery, output: &mut [Record]) -> Result<(), ExecutionError> {
    let mut ordered: Vec<&TargetColumn> =
        query.columns.iter().filter(|c| c.order.is_some()).collect();
    if ordered.is_empty() {
        return Ok(());
    }
    ordered.sort_by_key(|c| c.order.map(|(seq, _)| seq));

    for column in &ordered {
        let mut previous: Option<&Value> = None;
        for record in output.iter() {
            let Some(value) = record.get(&column.output_name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some(previous) = previous {
                compare_values(previous, value)?;
            }
            previous = Some(value);
        }
    }

    output.sort_by(|a, b| {
        for column in &ordered {
            let Some((_, direction)) = column.order else {
                continue;
            };
            let left = a.get(&column.output_name);
            let right = b.get(&column.output_name);
            let ordering = match (left, right) {
                (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
                (None | Some(Value::Null), Some(_)) => Ordering::Less,
                (Some(_), None | Some(Value::Null)) => Ordering::Greater,
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            };
            let ordering = match direction {
                SortDirection::Descending => ordering.reverse(),
                SortDirection::Ascending => ordering,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn page(output: Vec<Record>, skip: Option<i64>, take: Option<i64>) -> Vec<Record> {
    let skip = skip.unwrap_or(0).max(0) as usize;
    let mut paged: Vec<Record> = output.into_iter().skip(skip).collect();
    if let Some(take) = take {
        paged.truncate(take.max(0) as usize);
    }
    paged
}
