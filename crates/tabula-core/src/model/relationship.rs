use crate::model::Table;
use serde::{Deserialize, Serialize};

///
/// Relationship
///
/// Foreign-key relationship: `foreign_table.foreign_keys` references
/// `primary_table.primary_keys`, position by position.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    pub name: String,
    pub primary_table: Table,
    pub primary_keys: Vec<String>,
    pub foreign_table: Table,
    pub foreign_keys: Vec<String>,
}

impl Relationship {
    /// True if rows of `table` reference their parent through this relationship.
    #[must_use]
    pub fn is_parent_of(&self, table: &Table) -> bool {
        &self.foreign_table == table
    }

    /// Key column pairs as `(primary, foreign)`.
    pub fn key_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.primary_keys
            .iter()
            .zip(&self.foreign_keys)
            .map(|(pk, fk)| (pk.as_str(), fk.as_str()))
    }
}

///
/// RelationshipDirection
///
/// Which side of a relationship a join navigates towards.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RelationshipDirection {
    /// From a primary row to the rows referencing it.
    Children,
    /// From a referencing row to the row it references.
    Parents,
}

///
/// RelationshipSet
///
/// Relationships touching one table, split by the table's role.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelationshipSet {
    /// The table is the primary side.
    pub children: Vec<Relationship>,
    /// The table is the foreign side.
    pub parents: Vec<Relationship>,
}

impl RelationshipSet {
    /// Split relationships by the role `table` plays in each.
    #[must_use]
    pub fn partition(table: &Table, relationships: impl IntoIterator<Item = Relationship>) -> Self {
        let mut set = Self::default();
        for rel in relationships {
            if &rel.primary_table == table {
                set.children.push(rel.clone());
            }
            if &rel.foreign_table == table {
                set.parents.push(rel);
            }
        }
        set
    }
}
