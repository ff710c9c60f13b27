//! Query IR: an append-only operator chain and its normalized descriptor.
//!
//! Client code builds a [`Query`]; every builder call wraps the previous
//! chain in one more [`QueryNode`]. [`Query::flatten`] folds the chain into a
//! [`QueryDescriptor`] that the SQL generator consumes.

mod builder;
mod descriptor;
mod expr;
mod flatten;
mod node;

#[cfg(test)]
mod tests;

use thiserror::Error as ThisError;

pub use builder::Query;
pub use descriptor::{
    AggregateTerm, GroupingEntry, JoinEntry, OrderTerm, QueryDescriptor, SetOperation,
};
pub use expr::{AggregateOp, BinaryOp, ColumnRef, Expr, OrderDirection};
pub use flatten::flatten;
pub use node::{GroupSpec, JoinKind, JoinSpec, QueryNode, QueryOp, SetOperationKind};

///
/// QueryError
///
/// Structural errors raised while normalizing or compiling a query.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("query chain does not start from a base table")]
    MissingBaseTable,

    #[error("base table '{alias}' appears inside the chain")]
    NestedBaseTable { alias: String },

    #[error("distinct applied more than once")]
    DuplicateDistinct,

    #[error("skip already set to {previous}; cannot skip {requested}")]
    DuplicateSkip { previous: u64, requested: u64 },

    #[error("take already set to {previous}; cannot take {requested}")]
    IncompatibleTake { previous: u64, requested: u64 },

    #[error("count applied more than once")]
    DuplicateCount,

    #[error("only one set operation is supported per query")]
    DuplicateSetOperation,

    #[error("set operations cannot be combined with take")]
    SetOperationWithTake,

    #[error("set operations cannot be combined with count")]
    SetOperationWithCount,

    #[error("unknown alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("aggregate {op} requires a column argument")]
    AggregateArgumentRequired { op: AggregateOp },

    #[error("group by on '{alias}' has no keys")]
    GroupingWithoutKeys { alias: String },
}
