use crate::value::Value;
use std::fmt;

///
/// ColumnRef
///
/// One column of one aliased table occurrence.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

///
/// AggregateOp
///
/// Aggregate operators; `tag` is also the prefix of the embedded column
/// a grouped query produces for the aggregate.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
    Var,
}

impl AggregateOp {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::StdDev => "STDDEV",
            Self::Var => "VAR",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

///
/// Expr
///
/// Filter, having and projection expressions.
/// Literals become bind parameters during SQL generation.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    Binary {
        op: BinaryOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Not(Box<Self>),
    IsNull(Box<Self>),
    IsNotNull(Box<Self>),
    In {
        expr: Box<Self>,
        list: Vec<Value>,
    },
    Like {
        expr: Box<Self>,
        pattern: String,
    },
    /// `arg: None` is `COUNT(*)`-style.
    Aggregate {
        op: AggregateOp,
        arg: Option<ColumnRef>,
    },
}

impl Expr {
    #[must_use]
    pub fn col(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Column(ColumnRef::new(alias, column))
    }

    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::Eq, self, other.into())
    }

    #[must_use]
    pub fn not_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::NotEq, self, other.into())
    }

    #[must_use]
    pub fn lt(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::Lt, self, other.into())
    }

    #[must_use]
    pub fn lt_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::LtEq, self, other.into())
    }

    #[must_use]
    pub fn gt(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::Gt, self, other.into())
    }

    #[must_use]
    pub fn gt_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(BinaryOp::GtEq, self, other.into())
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::binary(BinaryOp::And, self, other)
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::binary(BinaryOp::Or, self, other)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull(Box::new(self))
    }

    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNotNull(Box::new(self))
    }

    #[must_use]
    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            expr: Box::new(self),
            list: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Self::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    #[must_use]
    pub const fn aggregate(op: AggregateOp, arg: Option<ColumnRef>) -> Self {
        Self::Aggregate { op, arg }
    }

    /// Column references in evaluation order.
    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        let mut stack = vec![self];

        while let Some(expr) = stack.pop() {
            match expr {
                Self::Column(col) => out.push(col),
                Self::Literal(_) => {}
                Self::Binary { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
                Self::Not(inner)
                | Self::IsNull(inner)
                | Self::IsNotNull(inner)
                | Self::In { expr: inner, .. }
                | Self::Like { expr: inner, .. } => stack.push(inner),
                Self::Aggregate { arg, .. } => out.extend(arg.iter()),
            }
        }

        out
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<ColumnRef> for Expr {
    fn from(col: ColumnRef) -> Self {
        Self::Column(col)
    }
}

macro_rules! expr_from_literal {
    ( $( $ty:ty ),* $(,)? ) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Self::Literal(Value::from(v))
                }
            }
        )*
    };
}

expr_from_literal!(bool, i32, i64, f64, &str, String);
