use crate::{
    model::{Relationship, RelationshipDirection, Table},
    query::{AggregateOp, ColumnRef, Expr, OrderDirection},
    value::Value,
};
use std::sync::Arc;

///
/// JoinSpec
///
/// Relationship-backed join between two aliased occurrences.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSpec {
    pub primary_table: Table,
    pub primary_keys: Vec<String>,
    pub foreign_table: Table,
    pub foreign_keys: Vec<String>,
    /// LEFT OUTER rather than INNER.
    pub outer: bool,
    pub direction: RelationshipDirection,
}

impl JoinSpec {
    #[must_use]
    pub fn from_relationship(
        relationship: &Relationship,
        direction: RelationshipDirection,
        outer: bool,
    ) -> Self {
        Self {
            primary_table: relationship.primary_table.clone(),
            primary_keys: relationship.primary_keys.clone(),
            foreign_table: relationship.foreign_table.clone(),
            foreign_keys: relationship.foreign_keys.clone(),
            outer,
            direction,
        }
    }

    /// Table the join navigates to.
    #[must_use]
    pub const fn target_table(&self) -> &Table {
        match self.direction {
            RelationshipDirection::Children => &self.foreign_table,
            RelationshipDirection::Parents => &self.primary_table,
        }
    }

    /// Key column pairs as `(from side, to side)`.
    pub fn key_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        let (from, to) = match self.direction {
            RelationshipDirection::Children => (&self.primary_keys, &self.foreign_keys),
            RelationshipDirection::Parents => (&self.foreign_keys, &self.primary_keys),
        };

        from.iter().zip(to).map(|(f, t)| (f.as_str(), t.as_str()))
    }
}

///
/// GroupSpec
///

#[derive(Clone, Debug, PartialEq)]
pub struct GroupSpec {
    pub keys: Vec<ColumnRef>,
    pub aggregates: Vec<(AggregateOp, ColumnRef)>,
}

///
/// JoinKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum JoinKind {
    Relation(JoinSpec),
    Cross(Table),
    GroupBy(GroupSpec),
}

///
/// SetOperationKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SetOperationKind {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOperationKind {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        }
    }
}

///
/// QueryOp
///
/// One operator of the chain. Only `BaseTable` stands without an input.
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOp {
    BaseTable {
        alias: String,
        table: Table,
    },
    Join {
        from_alias: String,
        join: JoinKind,
        to_alias: String,
    },
    Filter(Expr),
    Having(Expr),
    Projection(Expr),
    Distinct,
    OrderBy {
        alias: String,
        column: String,
        direction: OrderDirection,
    },
    SetOperation {
        kind: SetOperationKind,
        sql: String,
        params: Vec<(String, Value)>,
    },
    Skip(u64),
    Take(u64),
    Count,
    Aggregate {
        op: AggregateOp,
        alias: String,
        column: String,
    },
}

///
/// QueryNode
///
/// Immutable link of the operator chain: one operator wrapping the rest of
/// the query it was applied on top of. Chains share their prefixes.
///

#[derive(Debug)]
pub struct QueryNode {
    input: Option<Arc<Self>>,
    op: QueryOp,
}

impl QueryNode {
    #[must_use]
    pub fn base(alias: impl Into<String>, table: Table) -> Arc<Self> {
        Arc::new(Self {
            input: None,
            op: QueryOp::BaseTable {
                alias: alias.into(),
                table,
            },
        })
    }

    #[must_use]
    pub fn wrap(input: Arc<Self>, op: QueryOp) -> Arc<Self> {
        Arc::new(Self {
            input: Some(input),
            op,
        })
    }

    #[must_use]
    pub const fn input(&self) -> Option<&Arc<Self>> {
        self.input.as_ref()
    }

    #[must_use]
    pub const fn op(&self) -> &QueryOp {
        &self.op
    }
}

// Long chains would otherwise drop recursively, one frame per node.
impl Drop for QueryNode {
    fn drop(&mut self) {
        let mut next = self.input.take();
        while let Some(node) = next {
            next = match Arc::try_unwrap(node) {
                Ok(mut node) => node.input.take(),
                Err(_) => None,
            };
        }
    }
}
