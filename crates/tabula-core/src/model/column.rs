use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// TypeAffinity
///
/// Storage family of a column, independent of the vendor type tag.
/// Drives value coercion on typed column writes.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TypeAffinity {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Date,
    DateTime,
    Binary,
    Guid,
    Array,
    #[default]
    Other,
}

///
/// Column
///
/// Column descriptor discovered from the catalog (or loaded from a snapshot).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Column {
    pub name: String,
    pub affinity: TypeAffinity,
    /// Vendor type name as reported by the catalog (`nvarchar`, `int`, ...).
    pub type_tag: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    /// Value is assigned by the database on insert.
    pub is_identity: bool,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, affinity: TypeAffinity, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affinity,
            type_tag: type_tag.into(),
            is_nullable: true,
            is_primary_key: false,
            is_identity: false,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }
}

///
/// ColumnMap
///
/// Column name → descriptor for one table. Ordered by name so that
/// generated column lists are deterministic.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, IntoIterator, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ColumnMap(BTreeMap<String, Column>);

impl ColumnMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: Column) {
        self.0.insert(column.name.clone(), column);
    }

    /// Primary-key column names in name order.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<&str> {
        self.0
            .values()
            .filter(|column| column.is_primary_key)
            .map(|column| column.name.as_str())
            .collect()
    }

    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|column| column.is_primary_key)
    }
}

impl FromIterator<Column> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        let mut map = Self::new();
        for column in iter {
            map.insert(column);
        }
        map
    }
}
