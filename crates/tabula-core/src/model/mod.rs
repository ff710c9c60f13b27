//! Immutable table, column, relationship and stored-procedure descriptors.
//!
//! These are the foundation every other module reads; nothing here is
//! mutated after construction.

mod column;
mod relationship;
mod sproc;
mod table;

#[cfg(test)]
mod tests;

pub use column::{Column, ColumnMap, TypeAffinity};
pub use relationship::{Relationship, RelationshipDirection, RelationshipSet};
pub use sproc::{ParameterDirection, QueryParameter, Sproc, SprocDefinition, SprocName};
pub use table::Table;
