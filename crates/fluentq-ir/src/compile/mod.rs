//! Compilation of a frozen [`crate::QueryIr`] into the target query model.
//!
//! Split into the schema-resolution boundary ([`SchemaResolver`]), the
//! compiled output model ([`TargetQuery`] / [`Projector`]), and the
//! compiler itself ([`QueryCompiler`]).

mod compiler;
mod schema;
mod target;

pub use compiler::QueryCompiler;
pub use schema::{AggregateExpr, ColumnDescriptor, MockSchemaResolver, SchemaResolver};
pub use target::{
    ColumnValues, CompiledQuery, Operand, Projected, Projector, TargetColumn, TargetFilterGroup,
    TargetFilterItem, TargetQuery,
};
