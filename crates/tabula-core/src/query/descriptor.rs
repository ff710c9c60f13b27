use crate::{
    model::Table,
    query::{AggregateOp, ColumnRef, Expr, JoinSpec, OrderDirection, SetOperationKind},
    value::Value,
};
use std::collections::BTreeMap;

///
/// JoinEntry
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinEntry {
    pub from_alias: String,
    pub spec: JoinSpec,
    pub to_alias: String,
}

///
/// GroupingEntry
///

#[derive(Clone, Debug, PartialEq)]
pub struct GroupingEntry {
    pub alias: String,
    pub keys: Vec<ColumnRef>,
    pub aggregates: Vec<(AggregateOp, ColumnRef)>,
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderTerm {
    pub alias: String,
    pub column: String,
    pub direction: OrderDirection,
}

///
/// SetOperation
///
/// Second operand is pre-rendered SQL with its own named parameters.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SetOperation {
    pub kind: SetOperationKind,
    pub sql: String,
    pub params: Vec<(String, Value)>,
}

///
/// AggregateTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateTerm {
    pub op: AggregateOp,
    pub alias: String,
    pub column: String,
}

///
/// QueryDescriptor
///
/// Normalized form of an operator chain.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryDescriptor {
    pub base_alias: String,
    pub base_table: Table,
    pub filters: Vec<Expr>,
    pub having: Vec<Expr>,
    pub joins: Vec<JoinEntry>,
    pub cross_joins: Vec<(String, Table)>,
    /// Every alias the chain introduced, with the table it names.
    pub aliases: BTreeMap<String, Table>,
    pub ordering: Vec<OrderTerm>,
    pub projections: Vec<Expr>,
    pub grouping: Vec<GroupingEntry>,
    pub distinct: bool,
    pub ultimate_child: Option<(String, Table)>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub set_operation: Option<SetOperation>,
    pub count: bool,
    pub aggregate_ops: Vec<AggregateTerm>,
}

impl QueryDescriptor {
    #[must_use]
    pub(crate) fn new(base_alias: String, base_table: Table) -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert(base_alias.clone(), base_table.clone());

        Self {
            base_alias,
            base_table,
            filters: Vec::new(),
            having: Vec::new(),
            joins: Vec::new(),
            cross_joins: Vec::new(),
            aliases,
            ordering: Vec::new(),
            projections: Vec::new(),
            grouping: Vec::new(),
            distinct: false,
            ultimate_child: None,
            skip: None,
            take: None,
            set_operation: None,
            count: false,
            aggregate_ops: Vec::new(),
        }
    }

    /// Alias the FROM clause is rendered under.
    ///
    /// When joins renamed the base occurrence this is the ultimate child's
    /// alias, otherwise the base alias itself.
    #[must_use]
    pub fn source_alias(&self) -> &str {
        match &self.ultimate_child {
            Some((alias, table)) if *table == self.base_table && !self.is_join_target(alias) => {
                alias
            }
            _ => &self.base_alias,
        }
    }

    /// Map a referenced alias onto the alias it renders under.
    #[must_use]
    pub fn resolve_alias<'a>(&'a self, alias: &'a str) -> &'a str {
        if alias == self.base_alias {
            self.source_alias()
        } else {
            alias
        }
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.grouping.is_empty()
    }

    /// Requested output columns per (resolved) alias, in first-use order.
    #[must_use]
    pub fn projection_columns(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for col in self.projections.iter().flat_map(Expr::columns) {
            let alias = self.resolve_alias(&col.alias).to_string();
            let columns = out.entry(alias).or_default();
            if !columns.contains(&col.column) {
                columns.push(col.column.clone());
            }
        }

        out
    }

    fn is_join_target(&self, alias: &str) -> bool {
        self.joins.iter().any(|join| join.to_alias == alias)
            || self.cross_joins.iter().any(|(to, _)| to == alias)
    }
}
