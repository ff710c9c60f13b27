//! Boundary to the database driver and live catalog.
//!
//! Nothing in this crate talks to a network; vendor drivers implement
//! [`ConnectionFactory`], [`Connection`] and [`SchemaDiscovery`].

use crate::{
    model::{ParameterDirection, Relationship, Sproc, Table},
    persist::TransactionOptions,
    value::Value,
};
use async_trait::async_trait;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error as ThisError;

///
/// DriverError
///

#[derive(Debug, ThisError)]
pub enum DriverError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("command failed: {0}")]
    Execute(String),

    /// Unique or primary-key violation reported by the database.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("schema discovery failed: {0}")]
    Discovery(String),
}

///
/// CommandParameter
///

#[derive(Clone, Debug, PartialEq)]
pub struct CommandParameter {
    pub name: String,
    pub value: Value,
    pub direction: ParameterDirection,
    pub type_tag: Option<String>,
}

impl CommandParameter {
    #[must_use]
    pub fn input(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction: ParameterDirection::In,
            type_tag: None,
        }
    }
}

///
/// Command
///
/// SQL text with its bound parameters, ready for a [`Connection`].
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    pub text: String,
    pub params: Vec<CommandParameter>,
    pub timeout: Option<Duration>,
    /// Stored-procedure call rather than ad hoc text.
    pub is_procedure: bool,
}

impl Command {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<CommandParameter>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parameter names and values in binding order.
    #[must_use]
    pub fn param_pairs(&self) -> Vec<(String, Value)> {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }
}

///
/// ResultSet
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Rows as `(column, value)` pairs.
    pub fn records(&self) -> impl Iterator<Item = Vec<(String, Value)>> + '_ {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
    }

    /// First column of the first row.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

///
/// CommandResult
///

#[derive(Clone, Debug, PartialEq)]
pub enum CommandResult {
    Rows(ResultSet),
    Affected(u64),
    Scalar(Value),
    /// Several named results from one procedure call.
    Sets(Vec<(String, Self)>),
}

///
/// Connection
///
/// One open database connection. Not assumed to be safe for concurrent
/// use; callers serialize on the provider lock.
///

#[async_trait]
pub trait Connection: Send {
    fn execute(&mut self, command: &Command) -> Result<CommandResult, DriverError>;

    async fn execute_async(&mut self, command: &Command) -> Result<CommandResult, DriverError> {
        self.execute(command)
    }

    fn begin(&mut self, options: &TransactionOptions) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    async fn begin_async(&mut self, options: &TransactionOptions) -> Result<(), DriverError> {
        self.begin(options)
    }

    async fn commit_async(&mut self) -> Result<(), DriverError> {
        self.commit()
    }

    async fn rollback_async(&mut self) -> Result<(), DriverError> {
        self.rollback()
    }
}

///
/// ConnectionFactory
///

pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn Connection>, DriverError>;
}

///
/// RawColumn
///
/// Column as reported by the live catalog, before type mapping.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub type_tag: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
}

///
/// Descriptions
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Descriptions {
    pub table: Option<String>,
    pub columns: BTreeMap<String, String>,
}

///
/// SchemaDiscovery
///
/// Live catalog queries.
///

pub trait SchemaDiscovery: Send + Sync {
    fn tables(&self) -> Result<Vec<Table>, DriverError>;

    fn columns(&self, table: &Table) -> Result<Vec<RawColumn>, DriverError>;

    fn relationships(&self, table: &Table) -> Result<Vec<Relationship>, DriverError>;

    fn sprocs(&self) -> Result<Vec<Sproc>, DriverError>;

    fn descriptions(&self, _table: &Table) -> Result<Descriptions, DriverError> {
        Ok(Descriptions::default())
    }
}
