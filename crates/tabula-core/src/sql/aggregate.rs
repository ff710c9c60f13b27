use crate::{
    entity::EntityRef,
    query::AggregateOp,
    value::{CoercionError, FromValue, Value},
};
use thiserror::Error as ThisError;

///
/// AggregateError
///

#[derive(Debug, ThisError)]
pub enum AggregateError {
    #[error("no {op} aggregate for column '{column}' in group {key}")]
    NoMatchingColumn {
        op: AggregateOp,
        key: String,
        column: String,
    },

    #[error("group {key} carries no rows to read aggregates from")]
    UnsupportedRowShape { key: String },

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

///
/// GroupedRow
///
/// One group of a grouped query: its key values and the representative
/// row (one entity per table for joined groups) carrying the embedded
/// aggregate columns.
///

#[derive(Clone, Debug)]
pub struct GroupedRow {
    pub key: Vec<Value>,
    pub rows: Vec<EntityRef>,
}

impl GroupedRow {
    #[must_use]
    pub const fn new(key: Vec<Value>, rows: Vec<EntityRef>) -> Self {
        Self { key, rows }
    }

    /// Group key rendered for messages.
    #[must_use]
    pub fn key_label(&self) -> String {
        let parts: Vec<_> = self.key.iter().map(ToString::to_string).collect();
        format!("({})", parts.join(", "))
    }

    /// Read the `op` aggregate of `column`.
    ///
    /// The embedded column is found by case-insensitive match on both the
    /// `{OP}_` and `_{column}` tokens, across every row of the group.
    /// SQL-null reads as the target type's default.
    pub fn aggregate<T: FromValue>(&self, op: AggregateOp, column: &str) -> Result<T, AggregateError> {
        if self.rows.is_empty() {
            return Err(AggregateError::UnsupportedRowShape {
                key: self.key_label(),
            });
        }

        let prefix = format!("{}_", op.tag()).to_lowercase();
        let suffix = format!("_{column}").to_lowercase();

        let found = self.rows.iter().find_map(|row| {
            row.column_values().into_iter().find_map(|(name, value)| {
                let name = name.to_lowercase();
                (name.contains(&prefix) && name.contains(&suffix)).then_some(value)
            })
        });

        match found {
            None => Err(AggregateError::NoMatchingColumn {
                op,
                key: self.key_label(),
                column: column.to_string(),
            }),
            Some(Value::Null) => Ok(T::null_default()),
            Some(value) => Ok(T::from_value(&value)?),
        }
    }
}
