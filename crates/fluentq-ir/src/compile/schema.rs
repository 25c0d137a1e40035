//! Schema resolution interface.
//!
//! The compiler never knows column backing names itself; it asks a
//! [`SchemaResolver`] supplied by the embedding application. A mock
//! implementation backed by hash maps ships with the library so tests and
//! demos can compile queries without a real catalog.

use crate::value::ValueType;
use crate::vocab::AggregationKind;
use std::collections::HashMap;

/// Resolved description of one addressable column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Name of the backing column in the target model.
    pub backing_name: String,
    pub value_type: Option<ValueType>,
    /// True when the column points at a related record rather than a
    /// scalar. Lookup columns are re-resolved through the related schema's
    /// primary identifying sub-column before use.
    pub is_lookup: bool,
    /// Schema the lookup points at; `None` for scalar columns.
    pub referenced_schema: Option<String>,
}

impl ColumnDescriptor {
    pub fn scalar(backing_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            backing_name: backing_name.into(),
            value_type: Some(value_type),
            is_lookup: false,
            referenced_schema: None,
        }
    }

    pub fn lookup(backing_name: impl Into<String>, referenced_schema: impl Into<String>) -> Self {
        Self {
            backing_name: backing_name.into(),
            value_type: None,
            is_lookup: true,
            referenced_schema: Some(referenced_schema.into()),
        }
    }
}

/// Resolved aggregate over a column (or over the whole source when the
/// backing name is empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    pub backing_name: String,
    pub kind: AggregationKind,
}

/// Catalog interface the compiler resolves column paths through.
///
/// Errors are plain strings; the compiler wraps them into
/// [`crate::QueryError::Schema`].
pub trait SchemaResolver {
    /// Resolves a dotted column path within `schema`.
    fn resolve_column(&self, schema: &str, path: &str) -> Result<ColumnDescriptor, String>;

    /// Resolves an aggregate over `path`. An empty path means "aggregate of
    /// the source rows" and is only meaningful for `Count`.
    fn resolve_aggregation(
        &self,
        schema: &str,
        kind: AggregationKind,
        path: &str,
    ) -> Result<AggregateExpr, String>;

    /// Name of the primary identifying column of `schema`.
    fn primary_column_name(&self, schema: &str) -> Result<String, String>;
}

#[derive(Debug, Clone)]
struct MockSchema {
    primary: String,
    columns: HashMap<String, ColumnDescriptor>,
}

/// In-memory resolver for tests and demos.
///
/// Registered columns use their registered descriptors; unregistered paths
/// on a known schema echo the path as the backing name, so simple tests do
/// not have to declare every column they touch. Unknown schemas fail.
#[derive(Debug, Clone, Default)]
pub struct MockSchemaResolver {
    schemas: HashMap<String, MockSchema>,
}

impl MockSchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema with its primary identifying column.
    pub fn schema(mut self, name: &str, primary: &str) -> Self {
        self.schemas.insert(
            name.to_string(),
            MockSchema {
                primary: primary.to_string(),
                columns: HashMap::new(),
            },
        );
        self
    }

    /// Registers a scalar column. The backing name is the path itself.
    pub fn column(mut self, schema: &str, path: &str, value_type: ValueType) -> Self {
        if let Some(entry) = self.schemas.get_mut(schema) {
            entry
                .columns
                .insert(path.to_string(), ColumnDescriptor::scalar(path, value_type));
        }
        self
    }

    /// Registers a lookup column pointing at `referenced_schema`.
    pub fn lookup(mut self, schema: &str, path: &str, referenced_schema: &str) -> Self {
        if let Some(entry) = self.schemas.get_mut(schema) {
            entry.columns.insert(
                path.to_string(),
                ColumnDescriptor::lookup(path, referenced_schema),
            );
        }
        self
    }

    fn find(&self, schema: &str) -> Result<&MockSchema, String> {
        self.schemas
            .get(schema)
            .ok_or_else(|| format!("unknown schema '{schema}'"))
    }
}

impl SchemaResolver for MockSchemaResolver {
    fn resolve_column(&self, schema: &str, path: &str) -> Result<ColumnDescriptor, String> {
        let entry = self.find(schema)?;
        if path.is_empty() {
            return Err(format!("empty column path in schema '{schema}'"));
        }
        match entry.columns.get(path) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => Ok(ColumnDescriptor {
                backing_name: path.to_string(),
                value_type: None,
                is_lookup: false,
                referenced_schema: None,
            }),
        }
    }

    fn resolve_aggregation(
        &self,
        schema: &str,
        kind: AggregationKind,
        path: &str,
    ) -> Result<AggregateExpr, String> {
        if path.is_empty() {
            return Ok(AggregateExpr {
                backing_name: String::new(),
                kind,
            });
        }
        let descriptor = self.resolve_column(schema, path)?;
        Ok(AggregateExpr {
            backing_name: descriptor.backing_name,
            kind,
        })
    }

    fn primary_column_name(&self, schema: &str) -> Result<String, String> {
        Ok(self.find(schema)?.primary.clone())
    }
}
