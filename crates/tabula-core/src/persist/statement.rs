use crate::{
    driver::{Command, CommandParameter},
    entity::EntityRef,
    model::ColumnMap,
    persist::{ConflictPolicy, PersistError, WriteOperation},
    sql::{Dialect, Upsert},
    value::Value,
};

///
/// WriteStatement
///
/// One rendered write for one entity.
///

#[derive(Clone, Debug)]
pub struct WriteStatement {
    pub operation: WriteOperation,
    pub command: Command,
    /// The command's result carries the database-generated key.
    pub reads_identity: bool,
}

///
/// ParamList
///

struct ParamList<'a> {
    dialect: &'a dyn Dialect,
    params: Vec<CommandParameter>,
}

impl<'a> ParamList<'a> {
    const fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let name = self.dialect.parameter_name(self.params.len());
        self.params.push(CommandParameter::input(name.clone(), value));
        name
    }
}

pub(crate) fn insert(
    dialect: &dyn Dialect,
    entity: &EntityRef,
    columns: &ColumnMap,
) -> Result<WriteStatement, PersistError> {
    let table = entity.table();
    let values: Vec<(String, Value)> = entity
        .column_values()
        .into_iter()
        .filter(|(name, value)| !value.is_null() && (columns.is_empty() || columns.contains_key(name)))
        .collect();

    let mut params = ParamList::new(dialect);
    let bound: Vec<(String, String)> = values
        .into_iter()
        .map(|(name, value)| {
            let param = params.bind(value);
            (name, param)
        })
        .collect();

    let policy = entity.on_conflict();
    if policy != ConflictPolicy::Throw {
        if !dialect.supports_conflict_policy(policy) {
            return Err(PersistError::UnsupportedConflictPolicy {
                policy,
                dialect: dialect.name(),
            });
        }

        let keys: Vec<String> = columns.primary_keys().into_iter().map(str::to_string).collect();
        if let Some(missing) = missing_key(&keys, |key| bound.iter().any(|(name, _)| name == key)) {
            return Err(PersistError::MissingPrimaryKey {
                table: table.clone(),
                operation: WriteOperation::Insert,
                column: missing,
            });
        }

        let text = dialect
            .upsert(&Upsert {
                table,
                columns: &bound,
                keys: &keys,
                policy,
            })
            .ok_or(PersistError::UnsupportedConflictPolicy {
                policy,
                dialect: dialect.name(),
            })?;

        return Ok(WriteStatement {
            operation: WriteOperation::Insert,
            command: Command::new(text).with_params(params.params),
            reads_identity: false,
        });
    }

    let mut text = if bound.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", dialect.quote_table(table))
    } else {
        let names: Vec<_> = bound.iter().map(|(name, _)| dialect.quote_identifier(name)).collect();
        let placeholders: Vec<_> = bound.iter().map(|(_, param)| param.as_str()).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_table(table),
            names.join(", "),
            placeholders.join(", ")
        )
    };

    // a single absent key is the one the database assigns
    let keys = columns.primary_keys();
    let reads_identity = match (keys.as_slice(), dialect.identity_query()) {
        ([key], Some(identity)) if !bound.iter().any(|(name, _)| name == key) => {
            text.push_str("; ");
            text.push_str(identity);
            true
        }
        _ => false,
    };

    Ok(WriteStatement {
        operation: WriteOperation::Insert,
        command: Command::new(text).with_params(params.params),
        reads_identity,
    })
}

/// `None` when nothing changed outside the key.
pub(crate) fn update(
    dialect: &dyn Dialect,
    entity: &EntityRef,
    columns: &ColumnMap,
    extra: &[String],
) -> Result<Option<WriteStatement>, PersistError> {
    let keys = columns.primary_keys();
    let state = entity.state();

    let mut changed: Vec<&str> = Vec::new();
    for column in state.modified_columns().iter().chain(extra) {
        if !keys.contains(&column.as_str()) && !changed.contains(&column.as_str()) {
            changed.push(column);
        }
    }
    if changed.is_empty() {
        return Ok(None);
    }

    let key_values = key_values(entity, &keys, WriteOperation::Update)?;
    let mut params = ParamList::new(dialect);

    let assignments: Vec<_> = changed
        .iter()
        .map(|column| {
            let value = entity.get_value(column).unwrap_or(Value::Null);
            format!("{} = {}", dialect.quote_identifier(column), params.bind(value))
        })
        .collect();
    let predicate = key_predicate(dialect, &mut params, key_values);

    let text = format!(
        "UPDATE {} SET {} WHERE {predicate}",
        dialect.quote_table(entity.table()),
        assignments.join(", ")
    );

    Ok(Some(WriteStatement {
        operation: WriteOperation::Update,
        command: Command::new(text).with_params(params.params),
        reads_identity: false,
    }))
}

pub(crate) fn delete(
    dialect: &dyn Dialect,
    entity: &EntityRef,
    columns: &ColumnMap,
) -> Result<WriteStatement, PersistError> {
    let keys = columns.primary_keys();
    let key_values = key_values(entity, &keys, WriteOperation::Delete)?;

    let mut params = ParamList::new(dialect);
    let predicate = key_predicate(dialect, &mut params, key_values);
    let text = format!(
        "DELETE FROM {} WHERE {predicate}",
        dialect.quote_table(entity.table())
    );

    Ok(WriteStatement {
        operation: WriteOperation::Delete,
        command: Command::new(text).with_params(params.params),
        reads_identity: false,
    })
}

fn key_values(
    entity: &EntityRef,
    keys: &[&str],
    operation: WriteOperation,
) -> Result<Vec<(String, Value)>, PersistError> {
    let missing = missing_key(keys, |key| entity.has_value(key));
    if let Some(column) = missing {
        return Err(PersistError::MissingPrimaryKey {
            table: entity.table().clone(),
            operation,
            column,
        });
    }

    Ok(keys
        .iter()
        .map(|key| {
            let value = entity.get_value(key).unwrap_or(Value::Null);
            ((*key).to_string(), value)
        })
        .collect())
}

// first key without a value; an empty key set is reported as missing too
fn missing_key<K: AsRef<str>>(keys: &[K], present: impl Fn(&str) -> bool) -> Option<String> {
    if keys.is_empty() {
        return Some("(no primary key)".to_string());
    }

    keys.iter()
        .map(AsRef::as_ref)
        .find(|key| !present(key))
        .map(str::to_string)
}

fn key_predicate(
    dialect: &dyn Dialect,
    params: &mut ParamList<'_>,
    key_values: Vec<(String, Value)>,
) -> String {
    key_values
        .into_iter()
        .map(|(key, value)| format!("{} = {}", dialect.quote_identifier(&key), params.bind(value)))
        .collect::<Vec<_>>()
        .join(" AND ")
}
