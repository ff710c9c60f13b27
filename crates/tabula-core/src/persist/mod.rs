//! Change-tracking persistence: the dirty set and the write pipeline that
//! turns it into an ordered INSERT / UPDATE / DELETE batch.

mod apply;
mod changes;
mod plan;
mod statement;


use crate::{
    driver::DriverError,
    entity::EntityId,
    model::{ColumnMap, RelationshipSet, Table},
    sql::ProviderError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error as ThisError;

pub use apply::{apply_pending, apply_pending_async};
pub use changes::PendingChanges;
pub use plan::WritePlan;
pub use statement::WriteStatement;

///
/// ConflictPolicy
///
/// What an insert does when its primary key already exists.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Throw,
    Update,
    DoNothing,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Throw => "throw",
            Self::Update => "update",
            Self::DoNothing => "do_nothing",
        };
        write!(f, "{label}")
    }
}

///
/// IsolationLevel
///
/// Accepted and handed to the driver untouched.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
    #[default]
    Unspecified,
}

///
/// TransactionOptions
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub timeout: Option<Duration>,
}

///
/// WriteOperation
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WriteOperation {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

///
/// PersistError
///

#[derive(Debug, ThisError)]
pub enum PersistError {
    #[error("{operation} of entity {entity} on {table} failed: {source}")]
    Statement {
        entity: EntityId,
        table: Table,
        operation: WriteOperation,
        source: DriverError,
    },

    #[error("insert order cannot be resolved; cycle among {tables:?}")]
    DependencyCycle { tables: Vec<String> },

    #[error("{operation} on {table} needs a primary key value for '{column}'")]
    MissingPrimaryKey {
        table: Table,
        operation: WriteOperation,
        column: String,
    },

    #[error("conflict policy {policy} is not supported by the {dialect} dialect")]
    UnsupportedConflictPolicy {
        policy: ConflictPolicy,
        dialect: &'static str,
    },

    #[error("insert of entity {entity} on {table} conflicts with an existing row: {message}")]
    Conflict {
        entity: EntityId,
        table: Table,
        message: String,
    },

    #[error("metadata unavailable: {0}")]
    Metadata(#[from] ProviderError),

    #[error("transaction control failed: {0}")]
    Transaction(#[source] DriverError),
}

///
/// SchemaSource
///
/// Metadata the pipeline needs for every table it writes to.
///

pub trait SchemaSource: Send + Sync {
    fn columns(&self, table: &Table) -> Result<Arc<ColumnMap>, ProviderError>;

    fn relationships(&self, table: &Table) -> Result<RelationshipSet, ProviderError>;
}
