use crate::{
    model::{Relationship, RelationshipDirection, Table},
    query::{
        AggregateOp, ColumnRef, Expr, GroupSpec, JoinKind, JoinSpec, OrderDirection,
        QueryDescriptor, QueryError, QueryNode, QueryOp, SetOperationKind, flatten,
    },
    value::Value,
};
use std::sync::Arc;

///
/// Query
///
/// Immutable query builder. Every call returns a new query sharing the
/// chain it was built from; the receiver is never modified.
///

#[derive(Clone, Debug)]
pub struct Query {
    node: Arc<QueryNode>,
}

impl Query {
    #[must_use]
    pub fn from_table(alias: impl Into<String>, table: Table) -> Self {
        Self {
            node: QueryNode::base(alias, table),
        }
    }

    #[must_use]
    pub const fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    fn push(&self, op: QueryOp) -> Self {
        Self {
            node: QueryNode::wrap(Arc::clone(&self.node), op),
        }
    }

    // ------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------

    /// Inner join along `relationship`.
    ///
    /// A `from_alias` that was never declared names the base occurrence
    /// after the join renamed it.
    #[must_use]
    pub fn join(
        &self,
        from_alias: &str,
        relationship: &Relationship,
        direction: RelationshipDirection,
        to_alias: &str,
    ) -> Self {
        self.relation(from_alias, relationship, direction, to_alias, false)
    }

    /// Left outer join along `relationship`.
    #[must_use]
    pub fn left_join(
        &self,
        from_alias: &str,
        relationship: &Relationship,
        direction: RelationshipDirection,
        to_alias: &str,
    ) -> Self {
        self.relation(from_alias, relationship, direction, to_alias, true)
    }

    fn relation(
        &self,
        from_alias: &str,
        relationship: &Relationship,
        direction: RelationshipDirection,
        to_alias: &str,
        outer: bool,
    ) -> Self {
        self.push(QueryOp::Join {
            from_alias: from_alias.to_string(),
            join: JoinKind::Relation(JoinSpec::from_relationship(relationship, direction, outer)),
            to_alias: to_alias.to_string(),
        })
    }

    #[must_use]
    pub fn cross_join(&self, from_alias: &str, table: Table, to_alias: &str) -> Self {
        self.push(QueryOp::Join {
            from_alias: from_alias.to_string(),
            join: JoinKind::Cross(table),
            to_alias: to_alias.to_string(),
        })
    }

    /// Group rows of `alias` by `keys`, embedding `aggregates` in each group row.
    #[must_use]
    pub fn group_by<K, A>(&self, alias: &str, keys: K, aggregates: A) -> Self
    where
        K: IntoIterator<Item = ColumnRef>,
        A: IntoIterator<Item = (AggregateOp, ColumnRef)>,
    {
        self.push(QueryOp::Join {
            from_alias: alias.to_string(),
            join: JoinKind::GroupBy(GroupSpec {
                keys: keys.into_iter().collect(),
                aggregates: aggregates.into_iter().collect(),
            }),
            to_alias: alias.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Row shaping
    // ------------------------------------------------------------------

    #[must_use]
    pub fn filter(&self, expr: Expr) -> Self {
        self.push(QueryOp::Filter(expr))
    }

    #[must_use]
    pub fn having(&self, expr: Expr) -> Self {
        self.push(QueryOp::Having(expr))
    }

    #[must_use]
    pub fn select(&self, expr: Expr) -> Self {
        self.push(QueryOp::Projection(expr))
    }

    #[must_use]
    pub fn distinct(&self) -> Self {
        self.push(QueryOp::Distinct)
    }

    #[must_use]
    pub fn order_by(&self, alias: &str, column: &str) -> Self {
        self.order(alias, column, OrderDirection::Asc)
    }

    #[must_use]
    pub fn order_by_desc(&self, alias: &str, column: &str) -> Self {
        self.order(alias, column, OrderDirection::Desc)
    }

    fn order(&self, alias: &str, column: &str, direction: OrderDirection) -> Self {
        self.push(QueryOp::OrderBy {
            alias: alias.to_string(),
            column: column.to_string(),
            direction,
        })
    }

    // ------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------

    #[must_use]
    pub fn union(&self, sql: &str, params: Vec<(String, Value)>) -> Self {
        self.set_operation(SetOperationKind::Union, sql, params)
    }

    #[must_use]
    pub fn union_all(&self, sql: &str, params: Vec<(String, Value)>) -> Self {
        self.set_operation(SetOperationKind::UnionAll, sql, params)
    }

    #[must_use]
    pub fn intersect(&self, sql: &str, params: Vec<(String, Value)>) -> Self {
        self.set_operation(SetOperationKind::Intersect, sql, params)
    }

    #[must_use]
    pub fn except(&self, sql: &str, params: Vec<(String, Value)>) -> Self {
        self.set_operation(SetOperationKind::Except, sql, params)
    }

    fn set_operation(&self, kind: SetOperationKind, sql: &str, params: Vec<(String, Value)>) -> Self {
        self.push(QueryOp::SetOperation {
            kind,
            sql: sql.to_string(),
            params,
        })
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    #[must_use]
    pub fn skip(&self, n: u64) -> Self {
        self.push(QueryOp::Skip(n))
    }

    #[must_use]
    pub fn take(&self, n: u64) -> Self {
        self.push(QueryOp::Take(n))
    }

    #[must_use]
    pub fn count(&self) -> Self {
        self.push(QueryOp::Count)
    }

    #[must_use]
    pub fn aggregate(&self, op: AggregateOp, alias: &str, column: &str) -> Self {
        self.push(QueryOp::Aggregate {
            op,
            alias: alias.to_string(),
            column: column.to_string(),
        })
    }

    pub fn flatten(&self) -> Result<QueryDescriptor, QueryError> {
        flatten(&self.node)
    }
}
