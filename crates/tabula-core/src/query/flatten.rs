use crate::query::{
    AggregateTerm, GroupingEntry, JoinEntry, JoinKind, OrderTerm, QueryDescriptor, QueryError,
    QueryNode, QueryOp, SetOperation,
};
use tracing::debug;

///
/// Flattener
///
/// Accumulator for one pass over the chain, innermost operator first.
///

struct Flattener {
    desc: QueryDescriptor,
    // join endpoints in declaration order
    observed: Vec<String>,
}

impl Flattener {
    fn observe(&mut self, alias: &str) {
        if !self.observed.iter().any(|a| a == alias) {
            self.observed.push(alias.to_string());
        }
    }

    fn apply(&mut self, op: &QueryOp) -> Result<(), QueryError> {
        let desc = &mut self.desc;

        match op {
            QueryOp::BaseTable { alias, .. } => {
                return Err(QueryError::NestedBaseTable {
                    alias: alias.clone(),
                });
            }

            QueryOp::Join {
                from_alias,
                join,
                to_alias,
            } => match join {
                JoinKind::Relation(spec) => {
                    desc.aliases
                        .insert(to_alias.clone(), spec.target_table().clone());
                    desc.joins.push(JoinEntry {
                        from_alias: from_alias.clone(),
                        spec: spec.clone(),
                        to_alias: to_alias.clone(),
                    });
                    self.observe(from_alias);
                    self.observe(to_alias);
                }
                JoinKind::Cross(table) => {
                    desc.aliases.insert(to_alias.clone(), table.clone());
                    desc.cross_joins.push((to_alias.clone(), table.clone()));
                    self.observe(from_alias);
                    self.observe(to_alias);
                }
                JoinKind::GroupBy(spec) => {
                    if spec.keys.is_empty() {
                        return Err(QueryError::GroupingWithoutKeys {
                            alias: from_alias.clone(),
                        });
                    }
                    desc.grouping.push(GroupingEntry {
                        alias: from_alias.clone(),
                        keys: spec.keys.clone(),
                        aggregates: spec.aggregates.clone(),
                    });
                }
            },

            QueryOp::Filter(expr) => desc.filters.push(expr.clone()),
            QueryOp::Having(expr) => desc.having.push(expr.clone()),
            QueryOp::Projection(expr) => desc.projections.push(expr.clone()),

            QueryOp::Distinct => {
                if desc.distinct {
                    return Err(QueryError::DuplicateDistinct);
                }
                desc.distinct = true;
            }

            QueryOp::OrderBy {
                alias,
                column,
                direction,
            } => desc.ordering.push(OrderTerm {
                alias: alias.clone(),
                column: column.clone(),
                direction: *direction,
            }),

            QueryOp::SetOperation { kind, sql, params } => {
                if desc.set_operation.is_some() {
                    return Err(QueryError::DuplicateSetOperation);
                }
                if desc.take.is_some() {
                    return Err(QueryError::SetOperationWithTake);
                }
                if desc.count {
                    return Err(QueryError::SetOperationWithCount);
                }
                desc.set_operation = Some(SetOperation {
                    kind: *kind,
                    sql: sql.clone(),
                    params: params.clone(),
                });
            }

            QueryOp::Skip(requested) => {
                if let Some(previous) = desc.skip {
                    return Err(QueryError::DuplicateSkip {
                        previous,
                        requested: *requested,
                    });
                }
                desc.skip = Some(*requested);
            }

            QueryOp::Take(requested) => {
                if desc.set_operation.is_some() {
                    return Err(QueryError::SetOperationWithTake);
                }
                desc.take = Some(match desc.take {
                    None => *requested,
                    Some(previous) if *requested <= previous || *requested == 1 => {
                        previous.min(*requested)
                    }
                    Some(previous) => {
                        return Err(QueryError::IncompatibleTake {
                            previous,
                            requested: *requested,
                        });
                    }
                });
            }

            QueryOp::Count => {
                if desc.count {
                    return Err(QueryError::DuplicateCount);
                }
                if desc.set_operation.is_some() {
                    return Err(QueryError::SetOperationWithCount);
                }
                desc.count = true;
            }

            QueryOp::Aggregate { op, alias, column } => desc.aggregate_ops.push(AggregateTerm {
                op: *op,
                alias: alias.clone(),
                column: column.clone(),
            }),
        }

        Ok(())
    }

    /// Resolve the alias whose row shape the default projection reads.
    ///
    /// With joins present and the base alias never used as an endpoint, the
    /// base occurrence was renamed by the join; the first alias observed
    /// stands for it.
    fn finish(mut self) -> QueryDescriptor {
        let has_joins = !self.desc.joins.is_empty() || !self.desc.cross_joins.is_empty();
        let base_is_endpoint = self.observed.contains(&self.desc.base_alias);

        let child = match self.observed.first() {
            Some(alias) if has_joins && !base_is_endpoint => {
                let table = self
                    .desc
                    .aliases
                    .get(alias)
                    .cloned()
                    .unwrap_or_else(|| self.desc.base_table.clone());
                self.desc.aliases.insert(alias.clone(), table.clone());
                (alias.clone(), table)
            }
            _ => (self.desc.base_alias.clone(), self.desc.base_table.clone()),
        };
        self.desc.ultimate_child = Some(child);

        self.desc
    }
}

/// Fold an operator chain into its normalized descriptor.
///
/// The chain is walked iteratively; duplicate or conflicting terminal
/// operators fail instead of overwriting each other.
pub fn flatten(node: &QueryNode) -> Result<QueryDescriptor, QueryError> {
    let mut chain = Vec::new();
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        chain.push(current.op());
        cursor = current.input().map(AsRef::as_ref);
    }
    chain.reverse();

    let mut ops = chain.into_iter();
    let Some(QueryOp::BaseTable { alias, table }) = ops.next() else {
        return Err(QueryError::MissingBaseTable);
    };

    let mut flattener = Flattener {
        desc: QueryDescriptor::new(alias.clone(), table.clone()),
        observed: Vec::new(),
    };
    for op in ops {
        flattener.apply(op)?;
    }

    let desc = flattener.finish();
    debug!(
        base = %desc.base_table,
        joins = desc.joins.len() + desc.cross_joins.len(),
        filters = desc.filters.len(),
        grouped = desc.is_grouped(),
        "flattened query chain"
    );

    Ok(desc)
}
