use super::{Entity, EntityError};
use crate::value::{CoercionError, Value};

///
/// RowTarget
///
/// Arbitrary target shape an entity can be mapped onto.
///

pub trait RowTarget: Default {
    /// Field names in declaration order.
    fn fields() -> &'static [&'static str];

    fn assign(&mut self, field: &str, value: Value) -> Result<(), CoercionError>;
}

impl Entity {
    /// Map onto `T` by matching column names to field names.
    pub fn map_to<T: RowTarget>(&self) -> Result<T, EntityError> {
        self.map_with(|_, value| value)
    }

    /// Map onto `T`, passing each matched value through `transform` first.
    ///
    /// Names match case-insensitively with punctuation ignored, so
    /// `first_name`, `FirstName` and `[First Name]` are the same field.
    /// Fields with no matching column keep their default.
    pub fn map_with<T: RowTarget>(
        &self,
        transform: impl Fn(&str, Value) -> Value,
    ) -> Result<T, EntityError> {
        let values = self.column_values();
        let mut target = T::default();

        for field in T::fields() {
            let key = normalize_name(field);
            let Some((column, value)) = values.iter().find(|(name, _)| normalize_name(name) == key)
            else {
                continue;
            };

            target
                .assign(field, transform(column, value.clone()))
                .map_err(|source| EntityError::Mapping {
                    column: column.clone(),
                    field: (*field).to_string(),
                    source,
                })?;
        }

        Ok(target)
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
