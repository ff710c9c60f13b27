//! SQL generation and the vendor backend seam.
//!
//! The core renders through [`Dialect`] hooks and talks to a database only
//! through a [`SqlProvider`]; no vendor syntax lives outside a dialect.

mod aggregate;
mod dialect;
mod generator;
pub mod mssql;
mod provider;
mod scope;


use crate::{driver::DriverError, query::QueryError};
use thiserror::Error as ThisError;

pub use aggregate::{AggregateError, GroupedRow};
pub use dialect::{Dialect, Upsert};
pub use generator::{GeneratedSql, GroupedLayout, generate};
pub use mssql::{MsSqlDialect, MsSqlProvider};
pub use provider::{SprocResult, SqlProvider};
pub use scope::CommandScope;

///
/// ProviderError
///

#[derive(Debug, ThisError)]
pub enum ProviderError {
    /// The schema cache is offline and holds no entry for the request.
    #[error("offline schema cache has no {what} for {target}")]
    OfflineMetadata { what: &'static str, target: String },

    #[error("table '{table}' not found in the catalog")]
    UnknownTable { table: String },

    #[error("{dialect} does not support {feature}")]
    Unsupported {
        dialect: &'static str,
        feature: String,
    },

    #[error("procedure {procedure} takes {expected} arguments, got {actual}")]
    ArgumentCount {
        procedure: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("unexpected result from '{command}': {detail}")]
    UnexpectedResult { command: String, detail: String },
}
