//! Expression tree of the fluent query surface.
//!
//! Expressions are plain data; no evaluation happens here. The `Display`
//! impl exists so unsupported-expression errors can name the offending
//! sub-expression textually.

use fluentq_ir::Value;
use std::fmt;

/// Binary operator of an [`Expr::Binary`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Result operator applied inside an [`Expr::SubQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubQueryOp {
    /// Membership test; the inner expression is the probed column.
    Contains(Expr),
}

/// One node of a composed query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// Typed column accessor, the DSL's "get column by path" primitive.
    Column { path: String },
    /// Reference to the grouping key.
    Key,
    /// Member access on a column or key reference.
    Member { base: Box<Expr>, name: String },
    /// Positional access into an array-style grouping key.
    Index { base: Box<Expr>, index: usize },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Named function call: string predicates and aggregate functions.
    Call {
        name: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    /// Multi-field result element; `members` carries field names when the
    /// element is an object rather than a bare tuple.
    New {
        members: Option<Vec<String>>,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    /// Nested query over an inline source, used for containment tests.
    SubQuery {
        source: Box<Expr>,
        ops: Vec<SubQueryOp>,
    },
}

/// Column accessor: `col("Account.Name")`.
pub fn col(path: impl Into<String>) -> Expr {
    Expr::Column { path: path.into() }
}

/// Constant literal.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Grouping-key reference, valid after `group_by`.
pub fn key() -> Expr {
    Expr::Key
}

/// Object-shaped result element with named fields.
pub fn record(fields: Vec<(&str, Expr)>) -> Expr {
    let (members, args) = fields
        .into_iter()
        .map(|(name, expr)| (name.to_string(), expr))
        .unzip();
    Expr::New {
        members: Some(members),
        args,
    }
}

/// Tuple-shaped result element with positional fields.
pub fn row(args: Vec<Expr>) -> Expr {
    Expr::New {
        members: None,
        args,
    }
}

/// Count of rows in the current group.
pub fn group_count() -> Expr {
    aggregate_call("Count", None)
}

/// Minimum of `arg` over the current group.
pub fn group_min(arg: Expr) -> Expr {
    aggregate_call("Min", Some(arg))
}

pub fn group_max(arg: Expr) -> Expr {
    aggregate_call("Max", Some(arg))
}

pub fn group_avg(arg: Expr) -> Expr {
    aggregate_call("Average", Some(arg))
}

pub fn group_sum(arg: Expr) -> Expr {
    aggregate_call("Sum", Some(arg))
}

fn aggregate_call(name: &str, arg: Option<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        target: None,
        args: arg.into_iter().collect(),
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, other: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Le, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Dotted member access: `col("Account").member("Name")`.
    pub fn member(self, name: impl Into<String>) -> Expr {
        Expr::Member {
            base: Box::new(self),
            name: name.into(),
        }
    }

    /// Positional key access: `key().index(0)`.
    pub fn index(self, index: usize) -> Expr {
        Expr::Index {
            base: Box::new(self),
            index,
        }
    }

    fn pattern_call(self, name: &str, value: impl Into<Value>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            target: Some(Box::new(self)),
            args: vec![Expr::Constant(value.into())],
        }
    }

    pub fn contains(self, value: impl Into<Value>) -> Expr {
        self.pattern_call("Contains", value)
    }

    pub fn starts_with(self, value: impl Into<Value>) -> Expr {
        self.pattern_call("StartsWith", value)
    }

    pub fn ends_with(self, value: impl Into<Value>) -> Expr {
        self.pattern_call("EndsWith", value)
    }

    /// Membership in an inline collection, expressed through the sub-query
    /// form the visitor lowers to a set filter.
    pub fn in_values<I, V>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = values.into_iter().map(Into::into).collect();
        Expr::SubQuery {
            source: Box::new(Expr::Constant(Value::Array(items))),
            ops: vec![SubQueryOp::Contains(self)],
        }
    }

    /// Node kind name used in unsupported-expression errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::Column { .. } => "Column",
            Expr::Key => "Key",
            Expr::Member { .. } => "Member",
            Expr::Index { .. } => "Index",
            Expr::Binary { .. } => "Binary",
            Expr::Not(_) => "Not",
            Expr::Call { .. } => "Call",
            Expr::New { .. } => "New",
            Expr::Array(_) => "Array",
            Expr::SubQuery { .. } => "SubQuery",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{v}"),
            Expr::Column { path } => write!(f, "{path}"),
            Expr::Key => write!(f, "Key"),
            Expr::Member { base, name } => write!(f, "{base}.{name}"),
            Expr::Index { base, index } => write!(f, "{base}[{index}]"),
            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expr::Not(inner) => write!(f, "!({inner})"),
            Expr::Call { name, target, args } => {
                if let Some(target) = target {
                    write!(f, "{target}.")?;
                }
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::New { members, args } => {
                write!(f, "new(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match members.as_ref().and_then(|m| m.get(i)) {
                        Some(name) => write!(f, "{name}: {arg}")?,
                        None => write!(f, "{arg}")?,
                    }
                }
                write!(f, ")")
            }
            Expr::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Expr::SubQuery { source, ops } => {
                write!(f, "{source}")?;
                for op in ops {
                    match op {
                        SubQueryOp::Contains(inner) => write!(f, ".Contains({inner})")?,
                    }
                }
                Ok(())
            }
        }
    }
}
