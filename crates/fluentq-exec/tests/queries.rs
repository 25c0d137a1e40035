//! End-to-end tests: builder -> IR -> compiled query -> in-memory engine.

use fluentq_exec::{MemoryExecutor, Record, RowOutput};
use fluentq_expr::{col, group_count, group_min, group_sum, key, lit, query, record, ComposedQuery};
use fluentq_ir::compile::{CompiledQuery, MockSchemaResolver, QueryCompiler};
use fluentq_ir::{Value, ValueType};

fn resolver() -> MockSchemaResolver {
    MockSchemaResolver::new()
        .schema("Contact", "Id")
        .column("Contact", "Name", ValueType::Text)
        .column("Contact", "Age", ValueType::Int)
        .schema("Order", "Id")
        .column("Order", "Category", ValueType::Text)
        .column("Order", "Amount", ValueType::Int)
        .column("Order", "Status", ValueType::Text)
}

fn compile(composed: &ComposedQuery) -> CompiledQuery {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let resolver = resolver();
    let ir = composed.to_ir().unwrap();
    QueryCompiler::new(composed.schema.as_str(), &resolver)
        .compile(&ir)
        .unwrap()
}

fn contacts() -> Vec<Record> {
    vec![
        Record::new()
            .with("Id", 1i64)
            .with("Name", "CustomerA")
            .with("Age", 30i64),
        Record::new()
            .with("Id", 2i64)
            .with("Name", "SupplierB")
            .with("Age", 45i64),
        Record::new()
            .with("Id", 3i64)
            .with("Name", "CustomerC")
            .with("Age", 17i64),
        Record::new()
            .with("Id", 4i64)
            .with("Name", "CustomerD")
            .with("Age", 62i64),
    ]
}

fn orders() -> Vec<Record> {
    vec![
        Record::new()
            .with("Id", 1i64)
            .with("Category", "Books")
            .with("Amount", 10i64)
            .with("Status", "Open"),
        Record::new()
            .with("Id", 2i64)
            .with("Category", "Books")
            .with("Amount", 30i64)
            .with("Status", "Paid"),
        Record::new()
            .with("Id", 3i64)
            .with("Category", "Games")
            .with("Amount", 50i64)
            .with("Status", "Paid"),
        Record::new()
            .with("Id", 4i64)
            .with("Category", "Games")
            .with("Amount", 20i64)
            .with("Status", "Open"),
        Record::new()
            .with("Id", 5i64)
            .with("Category", "Games")
            .with("Amount", 40i64)
            .with("Status", "Paid"),
    ]
}

fn scalar(output: &RowOutput) -> &Value {
    output.as_scalar().expect("scalar result")
}

#[test]
fn conjunctive_filter_selects_single_row() {
    let composed = query("Contact")
        .filter(col("Name").starts_with("Customer").and(col("Age").ge(lit(18))))
        .filter(col("Age").lt(lit(40)))
        .select(col("Name"))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    assert_eq!(results, vec![RowOutput::Scalar(Value::from("CustomerA"))]);
}

#[test]
fn disjunction_and_negation() {
    let composed = query("Contact")
        .filter(
            col("Age").lt(lit(18)).or(col("Age").gt(lit(60))),
        )
        .select(col("Name"))
        .build();
    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    assert_eq!(results.len(), 2);

    let negated = query("Contact")
        .filter(col("Age").lt(lit(18)).or(col("Age").gt(lit(60))).not())
        .select(col("Name"))
        .build();
    let results = MemoryExecutor::execute(&compile(&negated), &contacts()).unwrap();
    let names: Vec<_> = results.iter().map(scalar).cloned().collect();
    assert_eq!(names, vec![Value::from("CustomerA"), Value::from("SupplierB")]);
}

#[test]
fn negated_clause_composes_with_earlier_filters() {
    let composed = query("Contact")
        .filter(col("Age").ge(lit(18)))
        .filter(col("Name").starts_with("Customer").not())
        .select(col("Name"))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    assert_eq!(results, vec![RowOutput::Scalar(Value::from("SupplierB"))]);
}

#[test]
fn set_membership_filter() {
    let composed = query("Order")
        .filter(col("Status").in_values(vec!["Open"]))
        .count();
    let results = MemoryExecutor::execute(&compile(&composed), &orders()).unwrap();
    assert_eq!(scalar(&results[0]), &Value::Int(2));
}

#[test]
fn ordering_with_paging() {
    let composed = query("Contact")
        .order_by_desc(col("Age"))
        .skip(lit(1))
        .take(lit(2))
        .select(col("Name"))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    let names: Vec<_> = results.iter().map(scalar).cloned().collect();
    assert_eq!(
        names,
        vec![Value::from("SupplierB"), Value::from("CustomerA")]
    );
}

#[test]
fn stable_multi_key_ordering() {
    let composed = query("Order")
        .order_by(col("Category"))
        .order_by_desc(col("Amount"))
        .select(col("Amount"))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &orders()).unwrap();
    let amounts: Vec<_> = results.iter().map(scalar).cloned().collect();
    assert_eq!(
        amounts,
        vec![
            Value::Int(30),
            Value::Int(10),
            Value::Int(50),
            Value::Int(40),
            Value::Int(20)
        ]
    );
}

#[test]
fn overall_count_min_avg() {
    let count = query("Contact").count();
    let results = MemoryExecutor::execute(&compile(&count), &contacts()).unwrap();
    assert_eq!(scalar(&results[0]), &Value::Int(4));

    let min = query("Contact").min(col("Age"));
    let results = MemoryExecutor::execute(&compile(&min), &contacts()).unwrap();
    assert_eq!(scalar(&results[0]), &Value::Int(17));

    let avg = query("Order").avg(col("Amount"));
    let results = MemoryExecutor::execute(&compile(&avg), &orders()).unwrap();
    assert_eq!(scalar(&results[0]), &Value::Float(30.0));
}

#[test]
fn first_returns_single_row() {
    let composed = query("Contact")
        .order_by(col("Age"))
        .select(col("Name"))
        .first();
    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    assert_eq!(results, vec![RowOutput::Scalar(Value::from("CustomerC"))]);
}

#[test]
fn grouped_counts_per_key() {
    let composed = query("Order")
        .group_by(col("Category"))
        .select(record(vec![("Cat", key()), ("Total", group_count())]))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &orders()).unwrap();
    assert_eq!(
        results,
        vec![
            RowOutput::Shaped(vec![Value::from("Books"), Value::Int(2)]),
            RowOutput::Shaped(vec![Value::from("Games"), Value::Int(3)]),
        ]
    );
}

#[test]
fn multi_aggregate_grouping_with_filtered_source() {
    let composed = query("Order")
        .filter(col("Status").eq(lit("Paid")))
        .group_by(col("Category"))
        .select(record(vec![
            ("Cat", key()),
            ("Low", group_min(col("Amount"))),
            ("Total", group_sum(col("Amount"))),
        ]))
        .build();

    let results = MemoryExecutor::execute(&compile(&composed), &orders()).unwrap();
    assert_eq!(
        results,
        vec![
            RowOutput::Shaped(vec![Value::from("Books"), Value::Int(30), Value::Int(30)]),
            RowOutput::Shaped(vec![Value::from("Games"), Value::Int(40), Value::Int(90)]),
        ]
    );
}

#[test]
fn rows_come_back_whole_without_projection() {
    let composed = query("Contact").filter(col("Age").gt(lit(40))).build();
    let results = MemoryExecutor::execute(&compile(&composed), &contacts()).unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        match result {
            RowOutput::Row(record) => assert!(record.get("Name").is_some()),
            other => panic!("expected whole rows, got {other:?}"),
        }
    }
}

#[test]
fn null_test_filters_missing_values() {
    let mut rows = contacts();
    rows.push(Record::new().with("Name", "Ghost").with("Age", Value::Null));

    let composed = query("Contact")
        .filter(col("Age").eq(lit(Value::Null)))
        .select(col("Name"))
        .build();
    let results = MemoryExecutor::execute(&compile(&composed), &rows).unwrap();
    assert_eq!(results, vec![RowOutput::Scalar(Value::from("Ghost"))]);
}
