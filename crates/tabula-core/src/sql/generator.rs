use crate::{
    driver::{Command, CommandParameter},
    model::Table,
    query::{
        AggregateOp, BinaryOp, ColumnRef, Expr, OrderDirection, QueryDescriptor, QueryError,
    },
    sql::Dialect,
    value::Value,
};
use std::collections::BTreeMap;
use tracing::debug;

///
/// GeneratedSql
///

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedSql {
    pub text: String,
    pub params: Vec<CommandParameter>,
}

impl GeneratedSql {
    #[must_use]
    pub fn into_command(self) -> Command {
        Command::new(self.text).with_params(self.params)
    }
}

///
/// GroupedLayout
///
/// Output column names of a grouped query: one per key, then one per
/// embedded aggregate.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupedLayout {
    pub keys: Vec<(ColumnRef, String)>,
    pub aggregates: Vec<(AggregateOp, ColumnRef, String)>,
}

impl GroupedLayout {
    /// Aggregates are named `{OP}_{column}`, or `{OP}_{alias}_{column}` when
    /// that would collide with a key or another aggregate.
    #[must_use]
    pub fn of(desc: &QueryDescriptor) -> Self {
        let keys: Vec<&ColumnRef> = desc.grouping.iter().flat_map(|g| &g.keys).collect();
        let aggregates: Vec<&(AggregateOp, ColumnRef)> =
            desc.grouping.iter().flat_map(|g| &g.aggregates).collect();

        let key_names = keys
            .iter()
            .map(|key| {
                let shared = keys.iter().filter(|k| k.column == key.column).count() > 1;
                let name = if shared {
                    format!("{}.{}", key.alias, key.column)
                } else {
                    key.column.clone()
                };
                ((*key).clone(), name)
            })
            .collect();

        let aggregate_names = aggregates
            .iter()
            .map(|(op, col)| {
                let clashes_key = keys.iter().any(|k| k.column == col.column);
                let clashes_aggregate = aggregates
                    .iter()
                    .filter(|(o, c)| o == op && c.column == col.column)
                    .count()
                    > 1;
                let name = if clashes_key || clashes_aggregate {
                    format!("{}_{}_{}", op.tag(), col.alias, col.column)
                } else {
                    format!("{}_{}", op.tag(), col.column)
                };
                (*op, col.clone(), name)
            })
            .collect();

        Self {
            keys: key_names,
            aggregates: aggregate_names,
        }
    }
}

///
/// SqlWriter
///

struct SqlWriter<'a> {
    dialect: &'a dyn Dialect,
    desc: &'a QueryDescriptor,
    params: Vec<CommandParameter>,
}

impl SqlWriter<'_> {
    fn q(&self, ident: &str) -> String {
        self.dialect.quote_identifier(ident)
    }

    fn bind(&mut self, value: &Value) -> String {
        let name = self.dialect.parameter_name(self.params.len());
        self.params
            .push(CommandParameter::input(name.clone(), value.clone()));
        name
    }

    fn alias<'s>(&'s self, alias: &'s str) -> Result<&'s str, QueryError> {
        let resolved = self.desc.resolve_alias(alias);
        if self.desc.aliases.contains_key(resolved) {
            Ok(resolved)
        } else {
            Err(QueryError::UnknownAlias {
                alias: alias.to_string(),
            })
        }
    }

    fn column(&self, alias: &str, column: &str) -> Result<String, QueryError> {
        let alias = self.alias(alias)?;
        Ok(format!("{}.{}", self.q(alias), self.q(column)))
    }

    fn expr(&mut self, expr: &Expr) -> Result<String, QueryError> {
        Ok(match expr {
            Expr::Column(col) => self.column(&col.alias, &col.column)?,
            Expr::Literal(Value::Null) => "NULL".to_string(),
            Expr::Literal(value) => self.bind(value),

            // comparisons against NULL are rewritten to IS [NOT] NULL
            Expr::Binary {
                op: op @ (BinaryOp::Eq | BinaryOp::NotEq),
                left,
                right,
            } if matches!(**right, Expr::Literal(Value::Null)) => {
                let left = self.expr(left)?;
                let test = if *op == BinaryOp::Eq { "IS NULL" } else { "IS NOT NULL" };
                format!("{left} {test}")
            }
            Expr::Binary { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                format!("({left} {} {right})", op.symbol())
            }

            Expr::Not(inner) => format!("NOT ({})", self.expr(inner)?),
            Expr::IsNull(inner) => format!("{} IS NULL", self.expr(inner)?),
            Expr::IsNotNull(inner) => format!("{} IS NOT NULL", self.expr(inner)?),
            Expr::In { expr, list } => {
                if list.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                let target = self.expr(expr)?;
                let items: Vec<_> = list.iter().map(|value| self.bind(value)).collect();
                format!("{target} IN ({})", items.join(", "))
            }
            Expr::Like { expr, pattern } => {
                let target = self.expr(expr)?;
                let pattern = self.bind(&Value::Text(pattern.clone()));
                format!("{target} LIKE {pattern}")
            }
            Expr::Aggregate { op, arg } => {
                let function = self.dialect.aggregate_function(*op);
                match (op, arg) {
                    (_, Some(col)) => format!("{function}({})", self.column(&col.alias, &col.column)?),
                    (AggregateOp::Count, None) => format!("{function}(*)"),
                    (op, None) => return Err(QueryError::AggregateArgumentRequired { op: *op }),
                }
            }
        })
    }

    fn conjunction(&mut self, exprs: &[Expr]) -> Result<Option<String>, QueryError> {
        if exprs.is_empty() {
            return Ok(None);
        }
        let parts = exprs
            .iter()
            .map(|expr| self.expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(parts.join(" AND ")))
    }

    fn select_list(&mut self, projection: &BTreeMap<String, Vec<String>>) -> Result<String, QueryError> {
        let desc = self.desc;

        if desc.is_grouped() {
            let layout = GroupedLayout::of(desc);
            let mut items = Vec::new();
            for (key, name) in &layout.keys {
                items.push(format!("{} AS {}", self.column(&key.alias, &key.column)?, self.q(name)));
            }
            for (op, col, name) in &layout.aggregates {
                items.push(format!(
                    "{}({}) AS {}",
                    self.dialect.aggregate_function(*op),
                    self.column(&col.alias, &col.column)?,
                    self.q(name)
                ));
            }
            return Ok(items.join(", "));
        }

        if !desc.aggregate_ops.is_empty() {
            let items = desc
                .aggregate_ops
                .iter()
                .map(|term| {
                    Ok(format!(
                        "{}({}) AS {}",
                        self.dialect.aggregate_function(term.op),
                        self.column(&term.alias, &term.column)?,
                        self.q(&format!("{}_{}", term.op.tag(), term.column))
                    ))
                })
                .collect::<Result<Vec<_>, QueryError>>()?;
            return Ok(items.join(", "));
        }

        if projection.is_empty() {
            let child = desc
                .ultimate_child
                .as_ref()
                .map_or(desc.base_alias.as_str(), |(alias, _)| alias.as_str());
            return Ok(format!("{}.*", self.q(self.alias(child)?)));
        }

        // qualified output names once more than one alias is read
        let qualified = projection.len() > 1;
        let mut items = Vec::new();
        for (alias, columns) in projection {
            for column in columns {
                let expr = self.column(alias, column)?;
                if qualified {
                    items.push(format!("{expr} AS {}", self.q(&format!("{alias}.{column}"))));
                } else {
                    items.push(expr);
                }
            }
        }

        Ok(items.join(", "))
    }

    fn from_clause(&self, base_alias: &str, base_table: &Table) -> Result<String, QueryError> {
        let desc = self.desc;
        let mut sql = format!(
            " FROM {} AS {}",
            self.dialect.quote_table(base_table),
            self.q(desc.resolve_alias(base_alias))
        );

        for join in &desc.joins {
            let from = self.alias(&join.from_alias)?;
            let kind = if join.spec.outer {
                "LEFT OUTER JOIN"
            } else {
                "INNER JOIN"
            };
            let on = join
                .spec
                .key_pairs()
                .map(|(f, t)| {
                    format!(
                        "{}.{} = {}.{}",
                        self.q(from),
                        self.q(f),
                        self.q(&join.to_alias),
                        self.q(t)
                    )
                })
                .collect::<Vec<_>>()
                .join(" AND ");

            sql.push_str(&format!(
                " {kind} {} AS {} ON {on}",
                self.dialect.quote_table(join.spec.target_table()),
                self.q(&join.to_alias)
            ));
        }

        for (alias, table) in &desc.cross_joins {
            sql.push_str(&format!(
                " CROSS JOIN {} AS {}",
                self.dialect.quote_table(table),
                self.q(alias)
            ));
        }

        Ok(sql)
    }

    fn render(
        mut self,
        base_alias: &str,
        base_table: &Table,
        projection: &BTreeMap<String, Vec<String>>,
    ) -> Result<GeneratedSql, QueryError> {
        let desc = self.desc;
        let paged = desc.skip.is_some() || desc.take.is_some();
        let wrap_count = desc.count && (desc.distinct || paged);
        let scalar = (desc.count && !wrap_count) || !desc.aggregate_ops.is_empty();

        let mut sql = String::from("SELECT");
        if desc.distinct {
            sql.push_str(" DISTINCT");
        }
        if !scalar && let Some(top) = self.dialect.top_clause(desc.skip, desc.take) {
            sql.push(' ');
            sql.push_str(&top);
        }
        sql.push(' ');
        if desc.count && !wrap_count {
            sql.push_str("COUNT(*)");
        } else {
            let list = self.select_list(projection)?;
            sql.push_str(&list);
        }

        sql.push_str(&self.from_clause(base_alias, base_table)?);

        if let Some(filter) = self.conjunction(&desc.filters)? {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }

        if desc.is_grouped() {
            let keys = desc
                .grouping
                .iter()
                .flat_map(|g| &g.keys)
                .map(|key| self.column(&key.alias, &key.column))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(having) = self.conjunction(&desc.having)? {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }

        // ORDER BY and OFFSET close the whole compound statement
        if let Some(set) = &desc.set_operation {
            sql.push_str(&format!(" {} {}", set.kind.keyword(), set.sql));
            self.params.extend(
                set.params
                    .iter()
                    .map(|(name, value)| CommandParameter::input(name.clone(), value.clone())),
            );
        }

        // a derived table may only be ordered when it is also paged
        let unordered_count = wrap_count && !paged;
        let mut ordered = false;
        if !scalar && !unordered_count && !desc.ordering.is_empty() {
            let terms = desc
                .ordering
                .iter()
                .map(|term| {
                    let column = self.column(&term.alias, &term.column)?;
                    Ok(match term.direction {
                        OrderDirection::Asc => column,
                        OrderDirection::Desc => format!("{column} DESC"),
                    })
                })
                .collect::<Result<Vec<_>, QueryError>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
            ordered = true;
        }

        if !scalar && let Some(paging) = self.dialect.paging_clause(desc.skip, desc.take, ordered) {
            sql.push(' ');
            sql.push_str(&paging);
        }

        if wrap_count {
            sql = format!("SELECT COUNT(*) FROM ({sql}) AS {}", self.q("counted"));
        }

        Ok(GeneratedSql {
            text: sql,
            params: self.params,
        })
    }
}

/// Render a normalized query as SQL text plus its bound parameters.
///
/// `projection` maps each alias to the columns to read; an empty map reads
/// every column of the ultimate child.
pub fn generate(
    dialect: &dyn Dialect,
    desc: &QueryDescriptor,
    base_alias: &str,
    base_table: &Table,
    projection: &BTreeMap<String, Vec<String>>,
) -> Result<GeneratedSql, QueryError> {
    let writer = SqlWriter {
        dialect,
        desc,
        params: Vec::new(),
    };
    let generated = writer.render(base_alias, base_table, projection)?;

    debug!(
        dialect = dialect.name(),
        sql = %generated.text,
        params = generated.params.len(),
        "generated query text"
    );

    Ok(generated)
}
