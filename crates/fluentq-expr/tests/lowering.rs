//! Builder-to-IR lowering tests.

use fluentq_expr::{col, group_count, group_min, key, lit, query, record};
use fluentq_ir::{AggregationKind, ComparisonKind, LogicalOp, QueryError, Value};

#[test]
fn and_predicates_collapse_into_root_scope() {
    let ir = query("Contact")
        .filter(col("Age").ge(lit(18)).and(col("City").eq(lit("Oslo"))))
        .build()
        .to_ir()
        .unwrap();

    let root = ir.filters.root();
    let scope = ir.filters.scope(root);
    assert_eq!(scope.op, LogicalOp::And);
    assert_eq!(scope.predicates.len(), 2);
    assert!(scope.children.is_empty());
    assert_eq!(scope.predicates[0].column, "Age");
    assert_eq!(
        scope.predicates[0].comparison,
        ComparisonKind::GreaterOrEqual
    );
    assert_eq!(scope.predicates[1].value, Value::from("Oslo"));
}

#[test]
fn or_scope_stays_nested() {
    let ir = query("Contact")
        .filter(col("Age").lt(lit(18)).or(col("Age").gt(lit(65))))
        .build()
        .to_ir()
        .unwrap();

    let root = ir.filters.root();
    assert_eq!(ir.filters.scope(root).children.len(), 1);
    let nested = ir.filters.scope(ir.filters.scope(root).children[0]);
    assert_eq!(nested.op, LogicalOp::Or);
    assert_eq!(nested.predicates.len(), 2);
}

#[test]
fn reversed_operand_order_mirrors_the_comparison() {
    let ir = query("Contact")
        .filter(lit(18).lt(col("Age")))
        .build()
        .to_ir()
        .unwrap();

    let scope = ir.filters.scope(ir.filters.root());
    assert_eq!(scope.predicates.len(), 1);
    assert_eq!(scope.predicates[0].column, "Age");
    assert_eq!(scope.predicates[0].comparison, ComparisonKind::Greater);
    assert_eq!(scope.predicates[0].value, Value::Int(18));
}

#[test]
fn string_pattern_calls_become_comparisons() {
    let ir = query("Contact")
        .filter(col("Name").starts_with("A").and(col("Email").contains("@example")))
        .build()
        .to_ir()
        .unwrap();

    let scope = ir.filters.scope(ir.filters.root());
    assert_eq!(scope.predicates[0].comparison, ComparisonKind::StartsWith);
    assert_eq!(scope.predicates[1].comparison, ComparisonKind::Contains);
    assert_eq!(scope.predicates[1].value, Value::from("@example"));
}

#[test]
fn standalone_boolean_column_gets_implicit_equal_true() {
    let ir = query("Contact")
        .filter(col("IsActive"))
        .build()
        .to_ir()
        .unwrap();

    let scope = ir.filters.scope(ir.filters.root());
    assert_eq!(scope.predicates.len(), 1);
    assert_eq!(scope.predicates[0].column, "IsActive");
    assert_eq!(scope.predicates[0].comparison, ComparisonKind::Equal);
    assert_eq!(scope.predicates[0].value, Value::Bool(true));
}

#[test]
fn negated_predicate_keeps_its_own_scope() {
    let ir = query("Contact")
        .filter(col("Age").ge(lit(18)).and(col("City").eq(lit("Oslo")).not()))
        .build()
        .to_ir()
        .unwrap();

    // The AND connective scope cannot merge upward while it holds the
    // negated child, so it survives as the root's only child.
    let root = ir.filters.root();
    assert!(ir.filters.scope(root).predicates.is_empty());
    assert_eq!(ir.filters.scope(root).children.len(), 1);
    let outer = ir.filters.scope(ir.filters.scope(root).children[0]);
    assert_eq!(outer.predicates.len(), 1);
    assert_eq!(outer.predicates[0].column, "Age");
    assert_eq!(outer.children.len(), 1);
    let negated = ir.filters.scope(outer.children[0]);
    assert!(negated.negate);
    assert_eq!(negated.predicates[0].column, "City");
}

#[test]
fn negation_in_one_clause_leaves_other_clauses_positive() {
    let ir = query("Contact")
        .filter(col("Age").ge(lit(18)))
        .filter(col("City").eq(lit("Oslo")).not())
        .build()
        .to_ir()
        .unwrap();

    // The second clause's NOT stays on its own scope; the first clause's
    // predicate and the root remain un-negated.
    let root = ir.filters.scope(ir.filters.root());
    assert!(!root.negate);
    assert_eq!(root.predicates.len(), 1);
    assert_eq!(root.predicates[0].column, "Age");
    assert_eq!(root.children.len(), 1);
    let negated = ir.filters.scope(root.children[0]);
    assert!(negated.negate);
    assert_eq!(negated.predicates.len(), 1);
    assert_eq!(negated.predicates[0].column, "City");
}

#[test]
fn double_negation_cancels_out() {
    let ir = query("Contact")
        .filter(col("Age").ge(lit(18)).not().not())
        .build()
        .to_ir()
        .unwrap();

    let root = ir.filters.scope(ir.filters.root());
    assert!(!root.negate);
    assert!(root.children.is_empty());
    assert_eq!(root.predicates.len(), 1);
    assert_eq!(root.predicates[0].column, "Age");
}

#[test]
fn null_comparison_is_rewritten_to_null_test() {
    let ir = query("Contact")
        .filter(col("Manager").eq(lit(Value::Null)))
        .build()
        .to_ir()
        .unwrap();

    let scope = ir.filters.scope(ir.filters.root());
    assert_eq!(scope.predicates[0].comparison, ComparisonKind::IsNull);
}

#[test]
fn null_with_relational_comparison_is_misuse() {
    let err = query("Contact")
        .filter(col("Age").gt(lit(Value::Null)))
        .build()
        .to_ir()
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::NullComparisonMisuse(ComparisonKind::Greater)
    ));
}

#[test]
fn grouping_with_named_key_fields() {
    let ir = query("Order")
        .group_by(record(vec![
            ("Cat", col("Category")),
            ("St", col("Status")),
        ]))
        .select(record(vec![
            ("Cat", key().member("Cat")),
            ("Low", group_min(col("Amount"))),
        ]))
        .build()
        .to_ir()
        .unwrap();

    assert_eq!(ir.groups.len(), 2);
    assert_eq!(ir.groups[0].alias.as_deref(), Some("Cat"));
    assert_eq!(ir.groups[1].alias.as_deref(), Some("St"));
    assert_eq!(ir.select[0].path, "Key/Cat");
    assert_eq!(ir.select[1].path, "Amount");
    assert_eq!(ir.select[1].aggregation, Some(AggregationKind::Min));
    let shape = ir.result_shape.unwrap();
    assert_eq!(shape.members.unwrap(), vec!["Cat", "Low"]);
}

#[test]
fn positional_key_access_lowers_to_synthetic_path() {
    let ir = query("Order")
        .group_by(record(vec![
            ("Cat", col("Category")),
            ("St", col("Status")),
        ]))
        .select(record(vec![
            ("First", key().index(0)),
            ("Total", group_count()),
        ]))
        .build()
        .to_ir()
        .unwrap();

    assert_eq!(ir.select[0].path, "Key/0");
    assert_eq!(ir.select[1].path, "");
    assert_eq!(ir.select[1].aggregation, Some(AggregationKind::Count));
}

#[test]
fn bare_key_select_over_single_group() {
    let ir = query("Order")
        .group_by(col("Category"))
        .select(record(vec![("Cat", key()), ("Total", group_count())]))
        .build()
        .to_ir()
        .unwrap();

    assert_eq!(ir.groups.len(), 1);
    assert_eq!(ir.select[0].path, "Key");
}

#[test]
fn sub_query_contains_becomes_equality_with_set() {
    let ir = query("Order")
        .filter(col("Status").in_values(vec!["Open", "Paid"]))
        .build()
        .to_ir()
        .unwrap();

    let scope = ir.filters.scope(ir.filters.root());
    assert_eq!(scope.predicates.len(), 1);
    assert_eq!(scope.predicates[0].column, "Status");
    assert_eq!(scope.predicates[0].comparison, ComparisonKind::Equal);
    assert_eq!(
        scope.predicates[0].value,
        Value::from(vec!["Open", "Paid"])
    );
}

#[test]
fn take_and_skip_require_integer_constants() {
    let ir = query("Contact")
        .skip(lit(20))
        .take(lit(10))
        .build()
        .to_ir()
        .unwrap();
    assert_eq!(ir.skip, Some(20));
    assert_eq!(ir.take, Some(10));

    let err = query("Contact").take(col("N")).build().to_ir().unwrap_err();
    assert!(matches!(err, QueryError::NonConstantBound { clause: "take" }));
}

#[test]
fn ordering_directions_are_recorded_in_sequence() {
    let ir = query("Contact")
        .order_by_desc(col("Age"))
        .order_by(col("Name"))
        .build()
        .to_ir()
        .unwrap();

    assert_eq!(ir.orders.len(), 2);
    assert!(ir.orders[0].descending);
    assert_eq!(ir.orders[0].path, "Age");
    assert!(!ir.orders[1].descending);
    assert_eq!(ir.orders[1].position, 1);
}

#[test]
fn terminal_count_collapses_to_result_aggregation() {
    let ir = query("Contact").count().to_ir().unwrap();
    assert!(ir.select.is_empty());
    assert_eq!(ir.result_aggregation, Some(AggregationKind::Count));
}

#[test]
fn terminal_first_takes_one_row() {
    let ir = query("Contact").first().to_ir().unwrap();
    assert_eq!(ir.take, Some(1));
    assert!(ir.result_aggregation.is_none());
}

#[test]
fn terminal_min_projects_its_selector() {
    let ir = query("Order").min(col("Amount")).to_ir().unwrap();
    assert_eq!(ir.select.len(), 1);
    assert_eq!(ir.select[0].path, "Amount");
    assert_eq!(ir.result_aggregation, Some(AggregationKind::Min));
}

#[test]
fn length_member_access_is_unsupported() {
    let err = query("Contact")
        .filter(col("Name").member("Length").gt(lit(3)))
        .build()
        .to_ir()
        .unwrap_err();
    match err {
        QueryError::UnsupportedExpression { expr, kind } => {
            assert_eq!(expr, "Name.Length");
            assert_eq!(kind, "Member");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn aggregate_inside_filter_is_an_illegal_transition() {
    let err = query("Order").filter(group_count()).build().to_ir().unwrap_err();
    assert!(matches!(
        err,
        QueryError::IllegalStateTransition {
            state: "Filtering",
            ..
        }
    ));
}

#[test]
fn aggregate_operand_in_a_comparison_is_unsupported() {
    let err = query("Order")
        .filter(group_count().gt(lit(1)))
        .build()
        .to_ir()
        .unwrap_err();
    match err {
        QueryError::UnsupportedExpression { kind, .. } => assert_eq!(kind, "Call"),
        other => panic!("unexpected error: {other}"),
    }
}
