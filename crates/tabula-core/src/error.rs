use crate::{
    cache::CacheError,
    config::ConfigError,
    driver::DriverError,
    entity::{EntityError, EntityId},
    model::Table,
    persist::{PersistError, WriteOperation},
    query::QueryError,
    sql::{AggregateError, ProviderError},
    value::CoercionError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every module error converts into this at the `DataContext` boundary.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a provider-origin not-found error.
    pub(crate) fn provider_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, ErrorOrigin::Provider, message)
    }

    /// Construct a query-origin unsupported error.
    pub(crate) fn query_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Query, message)
    }

    #[must_use]
    pub const fn is_invalid_operation(&self) -> bool {
        matches!(self.class, ErrorClass::InvalidOperation)
    }

    /// Persistence context of the failed write, if this error came from one.
    #[must_use]
    pub const fn write_failure(&self) -> Option<&WriteFailure> {
        match &self.detail {
            Some(ErrorDetail::Write(failure)) => Some(failure),
            None => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Write(WriteFailure),
}

///
/// WriteFailure
///
/// The entity, table and operation a failed write was issued for.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{operation} on {table} (entity {entity}) failed")]
pub struct WriteFailure {
    pub entity: EntityId,
    pub table: Table,
    pub operation: WriteOperation,
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvalidOperation,
    InvariantViolation,
    NotFound,
    Internal,
    Conflict,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidOperation => "invalid_operation",
            Self::InvariantViolation => "invariant_violation",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Query,
    Entity,
    Aggregate,
    Persist,
    Provider,
    Cache,
    Config,
    Driver,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Query => "query",
            Self::Entity => "entity",
            Self::Aggregate => "aggregate",
            Self::Persist => "persist",
            Self::Provider => "provider",
            Self::Cache => "cache",
            Self::Config => "config",
            Self::Driver => "driver",
        };
        write!(f, "{label}")
    }
}

///
/// CONVERSIONS
///

impl From<QueryError> for InternalError {
    fn from(err: QueryError) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Query, err.to_string())
    }
}

impl From<EntityError> for InternalError {
    fn from(err: EntityError) -> Self {
        let class = match err {
            EntityError::InvalidOperation { .. } => ErrorClass::InvalidOperation,
            EntityError::UnknownColumn { .. } => ErrorClass::NotFound,
            EntityError::RelationshipMismatch { .. } => ErrorClass::InvariantViolation,
            EntityError::Coercion { .. } | EntityError::Mapping { .. } => ErrorClass::Unsupported,
        };

        Self::new(class, ErrorOrigin::Entity, err.to_string())
    }
}

impl From<CoercionError> for InternalError {
    fn from(err: CoercionError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Entity, err.to_string())
    }
}

impl From<AggregateError> for InternalError {
    fn from(err: AggregateError) -> Self {
        let class = match err {
            AggregateError::NoMatchingColumn { .. } => ErrorClass::NotFound,
            AggregateError::UnsupportedRowShape { .. } => ErrorClass::Unsupported,
            AggregateError::Coercion(_) => ErrorClass::Unsupported,
        };

        Self::new(class, ErrorOrigin::Aggregate, err.to_string())
    }
}

impl From<PersistError> for InternalError {
    fn from(err: PersistError) -> Self {
        let message = err.to_string();
        match err {
            PersistError::Statement {
                entity,
                table,
                operation,
                ..
            } => Self {
                class: ErrorClass::Internal,
                origin: ErrorOrigin::Persist,
                message,
                detail: Some(ErrorDetail::Write(WriteFailure {
                    entity,
                    table,
                    operation,
                })),
            },
            PersistError::DependencyCycle { .. } => {
                Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Persist, message)
            }
            PersistError::MissingPrimaryKey { .. } => {
                Self::new(ErrorClass::InvalidOperation, ErrorOrigin::Persist, message)
            }
            PersistError::UnsupportedConflictPolicy { .. } => {
                Self::new(ErrorClass::Unsupported, ErrorOrigin::Persist, message)
            }
            PersistError::Conflict { .. } => {
                Self::new(ErrorClass::Conflict, ErrorOrigin::Persist, message)
            }
            PersistError::Metadata(_) | PersistError::Transaction(_) => {
                Self::new(ErrorClass::Internal, ErrorOrigin::Persist, message)
            }
        }
    }
}

impl From<ProviderError> for InternalError {
    fn from(err: ProviderError) -> Self {
        let class = match err {
            ProviderError::OfflineMetadata { .. } | ProviderError::UnknownTable { .. } => {
                ErrorClass::NotFound
            }
            ProviderError::Unsupported { .. } => ErrorClass::Unsupported,
            ProviderError::ArgumentCount { .. } => ErrorClass::InvalidOperation,
            ProviderError::Query(_) => ErrorClass::InvariantViolation,
            ProviderError::Driver(_) | ProviderError::UnexpectedResult { .. } => {
                ErrorClass::Internal
            }
        };

        Self::new(class, ErrorOrigin::Provider, err.to_string())
    }
}

impl From<DriverError> for InternalError {
    fn from(err: DriverError) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Driver, err.to_string())
    }
}

impl From<CacheError> for InternalError {
    fn from(err: CacheError) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Cache, err.to_string())
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Config, err.to_string())
    }
}
