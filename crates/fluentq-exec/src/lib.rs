//! fluentq in-memory execution engine
//!
//! Evaluates compiled queries against slices of in-memory records. Stands
//! in for a real backing store so whole compositions can be exercised end
//! to end:
//!
//! ```
//! use fluentq_exec::{MemoryExecutor, Record, RowOutput};
//! use fluentq_expr::{col, lit, query};
//! use fluentq_ir::compile::{MockSchemaResolver, QueryCompiler};
//! use fluentq_ir::Value;
//!
//! let resolver = MockSchemaResolver::new().schema("Contact", "Id");
//! let ir = query("Contact")
//!     .filter(col("Age").ge(lit(18)))
//!     .select(col("Name"))
//!     .build()
//!     .to_ir()
//!     .unwrap();
//! let compiled = QueryCompiler::new("Contact", &resolver).compile(&ir).unwrap();
//!
//! let rows = [
//!     Record::new().with("Name", "Ada").with("Age", 36i64),
//!     Record::new().with("Name", "Bo").with("Age", 12i64),
//! ];
//! let results = MemoryExecutor::execute(&compiled, &rows).unwrap();
//! assert_eq!(results, vec![RowOutput::Scalar(Value::from("Ada"))]);
//! ```

mod engine;
mod error;
mod record;

pub use engine::{MemoryExecutor, RowOutput};
pub use error::ExecutionError;
pub use record::Record;
