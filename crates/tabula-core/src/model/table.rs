use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Table
///
/// Schema-qualified relation identity.
/// `full_name` is synthesized once and used as the key into every metadata cache.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    schema: String,
    name: String,
    full_name: String,
}

impl Table {
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        let schema = schema.into();
        let name = name.into();
        let full_name = if schema.is_empty() {
            name.clone()
        } else {
            format!("{schema}.{name}")
        };

        Self {
            schema,
            name,
            full_name,
        }
    }

    /// Parse `schema.name`; a name without a dot has an empty schema.
    ///
    /// Only the first dot separates; table names may themselves contain dots.
    #[must_use]
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new("", full_name),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
