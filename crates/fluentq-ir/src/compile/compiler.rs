//! IR-to-target lowering.
//!
//! The compiler walks a frozen [`QueryIr`] and produces a [`CompiledQuery`]:
//! every distinct `(path, aggregation)` pair is resolved against the schema
//! exactly once, group columns are rebound to the projection/order entries
//! that reference them through synthetic `Key` paths, the filter tree is
//! lowered scope by scope, and a projector is derived from the recorded
//! result shape.

use crate::columns::{key_alias_path, key_index_path};
use crate::diag::{self, QueryStage};
use crate::error::QueryError;
use crate::filter::{FilterTree, ScopeId};
use crate::value::Value;
use crate::vocab::{AggregationKind, ComparisonKind, SortDirection};
use crate::QueryIr;
use std::collections::HashMap;

use super::schema::SchemaResolver;
use super::target::{
    CompiledQuery, Operand, Projector, TargetColumn, TargetFilterGroup, TargetFilterItem,
    TargetQuery,
};

/// Compiles query IRs against one schema through a [`SchemaResolver`].
pub struct QueryCompiler<'a> {
    schema: String,
    resolver: &'a dyn SchemaResolver,
}

/// Resolved columns keyed by `(path, aggregation)` so the same backing
/// column is never added twice.
#[derive(Default)]
struct ColumnTable {
    columns: Vec<TargetColumn>,
    index: HashMap<(String, Option<AggregationKind>), usize>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(schema: impl Into<String>, resolver: &'a dyn SchemaResolver) -> Self {
        Self {
            schema: schema.into(),
            resolver,
        }
    }

    /// Lowers `ir` into a target query plus projector. The caller's IR is
    /// never mutated; compilation works on an internal clone.
    pub fn compile(&self, ir: &QueryIr) -> Result<CompiledQuery, QueryError> {
        let _stage = diag::stage(QueryStage::Compile);
        self.dump_parts(ir);

        let mut ir = ir.clone();
        self.apply_result_aggregation(&mut ir)?;
        rebind_group_references(&mut ir);

        let mut table = ColumnTable::default();
        let mut backing_cache = HashMap::new();

        let mut select_names = Vec::with_capacity(ir.select.len());
        for column in &mut ir.select {
            let idx = self.get_or_add(&mut table, &mut backing_cache, &column.path, column.aggregation)?;
            let name = table.columns[idx].output_name.clone();
            column.resolved_name = Some(name.clone());
            select_names.push(name);
        }

        let mut orders: Vec<_> = ir.orders.iter().collect();
        orders.sort_by_key(|o| o.position);
        for (seq, order) in orders.into_iter().enumerate() {
            let idx = self.get_or_add(&mut table, &mut backing_cache, &order.path, order.aggregation)?;
            let direction = if order.descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            table.columns[idx].order = Some((seq as u32, direction));
        }

        // Group columns nothing references stay in the compiled query; their
        // presence is what defines the grouping.
        for group in &ir.groups {
            let idx = self.get_or_add(&mut table, &mut backing_cache, &group.path, None)?;
            table.columns[idx].grouped = true;
        }

        let filter = self.compile_scope(&mut backing_cache, &ir.filters, ir.filters.root())?;
        let projector = Self::build_projector(&ir, select_names)?;

        Ok(CompiledQuery {
            query: TargetQuery {
                schema: self.schema.clone(),
                columns: table.columns,
                filter,
                take: ir.take,
                skip: ir.skip,
            },
            projector,
        })
    }

    /// Pretty-printed dump of the accumulated parts, at debug level.
    /// Best-effort: a serialization failure degrades to a placeholder.
    fn dump_parts(&self, ir: &QueryIr) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let dump = serde_json::to_string_pretty(ir)
            .unwrap_or_else(|_| "<unserializable query parts>".to_string());
        tracing::debug!(schema = %self.schema, parts = %dump, "aggregated query parts");
    }

    /// Step 1: validate the overall aggregation and tag (or synthesize) the
    /// projection column it applies to.
    fn apply_result_aggregation(&self, ir: &mut QueryIr) -> Result<(), QueryError> {
        let Some(kind) = ir.result_aggregation else {
            return Ok(());
        };
        if ir.select.len() > 1 {
            return Err(QueryError::InvalidAggregationUsage(format!(
                "overall {kind} aggregation combined with {} projection columns",
                ir.select.len()
            )));
        }
        if let Some(column) = ir.select.first_mut() {
            column.aggregation = Some(kind);
            return Ok(());
        }
        // Only a count can aggregate "the whole row"; it counts through the
        // primary identifying column.
        if kind != AggregationKind::Count {
            return Err(QueryError::InvalidAggregationUsage(format!(
                "{kind} aggregation requires a selected column"
            )));
        }
        let primary = self
            .resolver
            .primary_column_name(&self.schema)
            .map_err(QueryError::Schema)?;
        ir.select
            .push(crate::columns::SelectColumn::new(primary, Some(kind)));
        Ok(())
    }

    fn get_or_add(
        &self,
        table: &mut ColumnTable,
        cache: &mut HashMap<String, String>,
        path: &str,
        aggregation: Option<AggregationKind>,
    ) -> Result<usize, QueryError> {
        let key = (path.to_string(), aggregation);
        if let Some(idx) = table.index.get(&key) {
            return Ok(*idx);
        }

        let column = match aggregation {
            Some(kind) => {
                let agg = self
                    .resolver
                    .resolve_aggregation(&self.schema, kind, path)
                    .map_err(QueryError::Schema)?;
                let output_name = format!("{}({})", kind.as_str(), agg.backing_name);
                TargetColumn {
                    output_name,
                    backing_name: agg.backing_name,
                    aggregation: Some(kind),
                    grouped: false,
                    order: None,
                }
            }
            None => {
                let backing = self.resolve_backing(cache, path)?;
                TargetColumn {
                    output_name: backing.clone(),
                    backing_name: backing,
                    aggregation: None,
                    grouped: false,
                    order: None,
                }
            }
        };

        let idx = table.columns.len();
        table.columns.push(column);
        table.index.insert(key, idx);
        Ok(idx)
    }

    /// Resolves a column path to its backing name, following a lookup
    /// through the related schema's primary identifying sub-column.
    fn resolve_backing(
        &self,
        cache: &mut HashMap<String, String>,
        path: &str,
    ) -> Result<String, QueryError> {
        if let Some(backing) = cache.get(path) {
            return Ok(backing.clone());
        }
        let descriptor = self
            .resolver
            .resolve_column(&self.schema, path)
            .map_err(QueryError::Schema)?;
        let backing = if descriptor.is_lookup {
            let referenced = descriptor
                .referenced_schema
                .as_deref()
                .unwrap_or(&self.schema);
            let primary = self
                .resolver
                .primary_column_name(referenced)
                .map_err(QueryError::Schema)?;
            let sub_path = format!("{path}.{primary}");
            self.resolver
                .resolve_column(&self.schema, &sub_path)
                .map_err(QueryError::Schema)?
                .backing_name
        } else {
            descriptor.backing_name
        };
        cache.insert(path.to_string(), backing.clone());
        Ok(backing)
    }

    /// Step 5: lowers one filter scope, expanding array-valued predicates
    /// into set membership and rewriting null operands into null tests.
    fn compile_scope(
        &self,
        cache: &mut HashMap<String, String>,
        tree: &FilterTree,
        id: ScopeId,
    ) -> Result<TargetFilterGroup, QueryError> {
        let scope = tree.scope(id);
        let mut group = TargetFilterGroup {
            op: scope.op,
            negate: scope.negate,
            items: Vec::new(),
        };
        for predicate in &scope.predicates {
            let backing_name = self.resolve_backing(cache, &predicate.column)?;
            let (comparison, operand) = match (predicate.comparison, &predicate.value) {
                (ComparisonKind::IsNull, _) => (ComparisonKind::IsNull, Operand::None),
                (ComparisonKind::IsNotNull, _) => (ComparisonKind::IsNotNull, Operand::None),
                (ComparisonKind::Equal, Value::Null) => (ComparisonKind::IsNull, Operand::None),
                (ComparisonKind::NotEqual, Value::Null) => {
                    (ComparisonKind::IsNotNull, Operand::None)
                }
                (other, Value::Null) => return Err(QueryError::NullComparisonMisuse(other)),
                (kind, Value::Array(items)) => (kind, Operand::Set(items.clone())),
                (kind, value) => (kind, Operand::Scalar(value.clone())),
            };
            group.items.push(TargetFilterItem::Comparison {
                backing_name,
                comparison,
                operand,
            });
        }
        for child in &scope.children {
            let sub = self.compile_scope(cache, tree, *child)?;
            if !sub.is_empty() {
                group.items.push(TargetFilterItem::Group(sub));
            }
        }
        Ok(group)
    }

    /// Step 6: derive the projector from the recorded shape.
    fn build_projector(ir: &QueryIr, select_names: Vec<String>) -> Result<Projector, QueryError> {
        if ir.result_aggregation.is_some() {
            // Step 1 guarantees exactly one tagged column by now.
            let column = select_names.into_iter().next().ok_or_else(|| {
                QueryError::InvalidAggregationUsage(
                    "overall aggregation resolved no projection column".to_string(),
                )
            })?;
            return Ok(Projector::Scalar { column });
        }
        match &ir.result_shape {
            None => match select_names.len() {
                0 => Ok(Projector::Row),
                1 => Ok(Projector::Scalar {
                    column: select_names.into_iter().next().unwrap_or_default(),
                }),
                n => Err(QueryError::AmbiguousOutputShape(n)),
            },
            Some(shape) => {
                if shape.arity != select_names.len() {
                    return Err(QueryError::AmbiguousOutputShape(select_names.len()));
                }
                Ok(Projector::Shaped {
                    columns: select_names,
                    shape: shape.clone(),
                })
            }
        }
    }
}

/// Step 2: rewrite projection and order entries that reference group
/// columns through synthetic `Key` paths back to the real column paths.
fn rebind_group_references(ir: &mut QueryIr) {
    let QueryIr {
        select,
        orders,
        groups,
        ..
    } = ir;
    let single_group = groups.len() == 1;

    for group in groups.iter() {
        let index_path = key_index_path(group.position);
        let alias_path = group.alias.as_deref().map(key_alias_path);

        let matches = |path: &str, aggregation: Option<AggregationKind>| {
            path == index_path
                || alias_path.as_deref() == Some(path)
                || (path == "Key" && single_group && aggregation.is_none())
                || (path.is_empty() && single_group && aggregation.is_some())
        };

        for column in select.iter_mut() {
            if matches(&column.path, column.aggregation) {
                column.path = group.path.clone();
            }
        }
        for order in orders.iter_mut() {
            if matches(&order.path, order.aggregation) {
                order.path = group.path.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{GroupColumn, OrderColumn, SelectColumn};
    use crate::compile::MockSchemaResolver;
    use crate::filter::FilterPredicate;
    use crate::value::ValueType;

    fn resolver() -> MockSchemaResolver {
        MockSchemaResolver::new()
            .schema("Order", "Id")
            .column("Order", "Amount", ValueType::Float)
            .column("Order", "Category", ValueType::Text)
    }

    #[test]
    fn rebinds_key_index_and_alias_paths() {
        let mut ir = QueryIr::new();
        let mut by_name = GroupColumn::new(0, "Category");
        by_name.alias = Some("Cat".to_string());
        ir.groups.push(by_name);
        ir.groups.push(GroupColumn::new(1, "Amount"));
        ir.select.push(SelectColumn::new("Key/Cat", None));
        ir.select.push(SelectColumn::new("Key/1", None));

        rebind_group_references(&mut ir);
        assert_eq!(ir.select[0].path, "Category");
        assert_eq!(ir.select[1].path, "Amount");
    }

    #[test]
    fn rebinds_bare_key_and_empty_aggregate_for_single_group() {
        let mut ir = QueryIr::new();
        ir.groups.push(GroupColumn::new(0, "Category"));
        ir.select.push(SelectColumn::new("Key", None));
        ir.select
            .push(SelectColumn::new("", Some(AggregationKind::Count)));
        ir.orders.push(OrderColumn {
            path: "Key".to_string(),
            aggregation: None,
            descending: false,
            position: 0,
        });

        rebind_group_references(&mut ir);
        assert_eq!(ir.select[0].path, "Category");
        assert_eq!(ir.select[1].path, "Category");
        assert_eq!(ir.orders[0].path, "Category");
    }

    #[test]
    fn null_misuse_is_rejected_during_filter_lowering() {
        let resolver = resolver();
        let compiler = QueryCompiler::new("Order", &resolver);
        let mut ir = QueryIr::new();
        ir.filters.add_predicate(
            ir.filters.root(),
            FilterPredicate::new("Amount", ComparisonKind::Greater, Value::Null),
        );
        let err = compiler.compile(&ir).unwrap_err();
        assert!(matches!(
            err,
            QueryError::NullComparisonMisuse(ComparisonKind::Greater)
        ));
    }

    #[test]
    fn count_without_selection_uses_primary_column() {
        let resolver = resolver();
        let compiler = QueryCompiler::new("Order", &resolver);
        let mut ir = QueryIr::new();
        ir.result_aggregation = Some(AggregationKind::Count);

        let compiled = compiler.compile(&ir).unwrap();
        assert_eq!(compiled.query.columns.len(), 1);
        assert_eq!(compiled.query.columns[0].backing_name, "Id");
        assert_eq!(
            compiled.query.columns[0].aggregation,
            Some(AggregationKind::Count)
        );
        assert!(matches!(compiled.projector, Projector::Scalar { .. }));
    }

    #[test]
    fn non_count_overall_aggregation_needs_a_column() {
        let resolver = resolver();
        let compiler = QueryCompiler::new("Order", &resolver);
        let mut ir = QueryIr::new();
        ir.result_aggregation = Some(AggregationKind::Sum);
        let err = compiler.compile(&ir).unwrap_err();
        assert!(matches!(err, QueryError::InvalidAggregationUsage(_)));
    }
}
