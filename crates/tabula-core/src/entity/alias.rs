use super::{Entity, EntityRef, EntityState};
use crate::{model::Table, value::Value};
use std::{collections::BTreeMap, sync::Arc};

impl Entity {
    /// Carve the columns produced for `alias` out of a joined row.
    ///
    /// Column names are matched against every quoting convention a vendor
    /// may produce (`[o].[Id]`, `` `o`.`Id` ``, `"o"."Id"`, `o.Id`, `o_Id`),
    /// case-insensitively. The result is cached per alias.
    pub fn sub_entity(&self, alias: &str, table: &Table) -> EntityRef {
        if let Some(cached) = self.inner.lock().aliases.get(alias) {
            return Arc::clone(cached);
        }

        let values: BTreeMap<String, Value> = self
            .column_values()
            .into_iter()
            .filter_map(|(name, value)| strip_alias(&name, alias).map(|column| (column, value)))
            .collect();

        let columns = self
            .tracker()
            .and_then(|tracker| tracker.column_model(table))
            .unwrap_or_default();

        let sub = Self::build(
            table.clone(),
            columns,
            values,
            EntityState::Unchanged,
            self.tracker.clone(),
        );

        let mut inner = self.inner.lock();
        Arc::clone(inner.aliases.entry(alias.to_string()).or_insert(sub))
    }
}

/// Return the unqualified column name if `column` was produced for `alias`.
#[must_use]
pub fn strip_alias(column: &str, alias: &str) -> Option<String> {
    let prefixes = [
        format!("[{alias}]."),
        format!("`{alias}`."),
        format!("\"{alias}\"."),
        format!("{alias}."),
        format!("{alias}_"),
    ];

    let rest = prefixes.iter().find_map(|prefix| {
        column
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| &column[prefix.len()..])
    })?;

    let unquoted = unquote(rest);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

fn unquote(name: &str) -> &str {
    for (open, close) in [('[', ']'), ('`', '`'), ('"', '"')] {
        if let Some(inner) = name
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner;
        }
    }
    name
}
