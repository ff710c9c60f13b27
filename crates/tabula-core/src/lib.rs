//! Core runtime for Tabula: the query IR and its SQL compiler, the
//! change-tracked entity record, and the write pipeline that persists it.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod config;
pub mod context;
pub mod driver;
pub mod entity;
pub mod error;
pub mod model;
pub mod obs;
pub mod persist;
pub mod query;
pub mod sql;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Row count used by `top_rows` when the caller does not name one.
pub const DEFAULT_TOP_ROWS: u64 = 100;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, drivers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        context::DataContext,
        entity::{EntityRef, EntityState},
        model::{Column, ColumnMap, Relationship, Table},
        query::{AggregateOp, ColumnRef, Expr, OrderDirection, Query},
        value::Value,
    };
}
