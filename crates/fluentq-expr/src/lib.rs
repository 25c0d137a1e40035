//! fluentq caller-facing query surface
//!
//! A fluent, declarative builder over named data schemas. Compositions are
//! plain expression trees; [`ComposedQuery::to_ir`] walks them through the
//! clause-mode state machine of `fluentq-ir` and yields the IR handed to
//! the compiler.
//!
//! ```
//! use fluentq_expr::{col, lit, query};
//!
//! let ir = query("Contact")
//!     .filter(col("Age").ge(lit(18)).and(col("Name").starts_with("A")))
//!     .order_by(col("Name"))
//!     .build()
//!     .to_ir()
//!     .unwrap();
//! assert_eq!(ir.filters.predicate_count(), 2);
//! ```

pub mod expr;
pub mod query;
mod to_ir;

pub use expr::{
    col, group_avg, group_count, group_max, group_min, group_sum, key, lit, record, row,
    BinaryOp, Expr, SubQueryOp,
};
pub use query::{query, ComposedQuery, QueryOp, SchemaQuery, Terminal};
