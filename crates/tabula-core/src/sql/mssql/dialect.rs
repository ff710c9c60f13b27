use crate::{
    persist::ConflictPolicy,
    query::AggregateOp,
    sql::{Dialect, Upsert},
};
use std::fmt::Write as _;

///
/// MsSqlDialect
///
/// Bracket quoting, `@pN` parameters, `TOP` / `OFFSET … FETCH` paging and
/// `MERGE` for insert conflict resolution.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn parameter_name(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn top_clause(&self, skip: Option<u64>, take: Option<u64>) -> Option<String> {
        match (skip, take) {
            (None, Some(n)) => Some(format!("TOP {n}")),
            _ => None,
        }
    }

    fn paging_clause(&self, skip: Option<u64>, take: Option<u64>, ordered: bool) -> Option<String> {
        let skip = skip?;
        let mut clause = String::new();

        // OFFSET is only legal after an ORDER BY
        if !ordered {
            clause.push_str("ORDER BY (SELECT NULL) ");
        }
        let _ = write!(clause, "OFFSET {skip} ROWS");
        if let Some(take) = take {
            let _ = write!(clause, " FETCH NEXT {take} ROWS ONLY");
        }

        Some(clause)
    }

    fn aggregate_function(&self, op: AggregateOp) -> &'static str {
        match op {
            AggregateOp::Count => "COUNT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::StdDev => "STDEV",
            AggregateOp::Var => "VAR",
        }
    }

    fn identity_query(&self) -> Option<&'static str> {
        Some("SELECT SCOPE_IDENTITY()")
    }

    fn supports_conflict_policy(&self, _policy: ConflictPolicy) -> bool {
        true
    }

    fn upsert(&self, upsert: &Upsert<'_>) -> Option<String> {
        let Upsert {
            table,
            columns,
            keys,
            policy,
        } = *upsert;
        if keys.is_empty() || matches!(policy, ConflictPolicy::Throw) {
            return None;
        }

        let q = |ident: &str| self.quote_identifier(ident);
        let source = columns
            .iter()
            .map(|(column, param)| format!("{param} AS {}", q(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let on = keys
            .iter()
            .map(|key| format!("[target].{0} = [source].{0}", q(key)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let names = columns
            .iter()
            .map(|(column, _)| q(column))
            .collect::<Vec<_>>()
            .join(", ");
        let values = columns
            .iter()
            .map(|(column, _)| format!("[source].{}", q(column)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS [target] USING (SELECT {source}) AS [source] ON {on}",
            self.quote_table(table)
        );

        let updates: Vec<_> = columns
            .iter()
            .filter(|(column, _)| !keys.contains(column))
            .map(|(column, _)| format!("[target].{0} = [source].{0}", q(column)))
            .collect();
        if matches!(policy, ConflictPolicy::Update) && !updates.is_empty() {
            let _ = write!(sql, " WHEN MATCHED THEN UPDATE SET {}", updates.join(", "));
        }
        let _ = write!(sql, " WHEN NOT MATCHED THEN INSERT ({names}) VALUES ({values});");

        Some(sql)
    }
}
