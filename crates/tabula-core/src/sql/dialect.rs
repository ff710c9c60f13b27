use crate::{model::Table, persist::ConflictPolicy, query::AggregateOp};
use std::fmt;

///
/// Upsert
///
/// Insert-or-resolve statement request. `columns` pairs each written
/// column with the parameter that carries its value.
///

#[derive(Clone, Copy, Debug)]
pub struct Upsert<'a> {
    pub table: &'a Table,
    pub columns: &'a [(String, String)],
    pub keys: &'a [String],
    pub policy: ConflictPolicy,
}

///
/// Dialect
///
/// Vendor SQL conventions. Everything the generator and the write pipeline
/// render goes through these hooks.
///

pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String;

    fn quote_table(&self, table: &Table) -> String {
        if table.schema().is_empty() {
            self.quote_identifier(table.name())
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(table.schema()),
                self.quote_identifier(table.name())
            )
        }
    }

    /// Placeholder for the zero-based `index`-th bound parameter.
    fn parameter_name(&self, index: usize) -> String;

    /// Row limit placed right after `SELECT [DISTINCT]`, if the dialect uses one.
    fn top_clause(&self, skip: Option<u64>, take: Option<u64>) -> Option<String>;

    /// Trailing paging clause. `ordered` tells whether an ORDER BY was rendered.
    fn paging_clause(&self, skip: Option<u64>, take: Option<u64>, ordered: bool) -> Option<String>;

    fn aggregate_function(&self, op: AggregateOp) -> &'static str;

    /// Statement appended to an INSERT to read back the generated key.
    fn identity_query(&self) -> Option<&'static str>;

    fn supports_conflict_policy(&self, policy: ConflictPolicy) -> bool {
        matches!(policy, ConflictPolicy::Throw)
    }

    fn upsert(&self, upsert: &Upsert<'_>) -> Option<String>;
}
