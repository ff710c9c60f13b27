use crate::{
    cache::SchemaCache,
    driver::{Command, CommandParameter, CommandResult, Connection, Descriptions, ResultSet},
    model::{ColumnMap, QueryParameter, RelationshipSet, Sproc, SprocDefinition, Table, TypeAffinity},
    persist::{self, PendingChanges, PersistError, SchemaSource, TransactionOptions},
    query::QueryDescriptor,
    sql::{CommandScope, Dialect, GeneratedSql, ProviderError, generate},
    value::Value,
};
use async_trait::async_trait;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

///
/// SprocResult
///
/// Outcome of a stored-procedure call.
///

#[derive(Clone, Debug, PartialEq)]
pub enum SprocResult {
    Unit,
    Scalar(Value),
    Set(ResultSet),
    /// Named result sets and scalars, in the order the procedure produced them.
    Multiple(Vec<(String, Self)>),
}

impl From<CommandResult> for SprocResult {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::Affected(_) => Self::Unit,
            CommandResult::Scalar(value) => Self::Scalar(value),
            CommandResult::Rows(set) => Self::Set(set),
            CommandResult::Sets(sets) => Self::Multiple(
                sets.into_iter()
                    .map(|(name, result)| (name, Self::from(result)))
                    .collect(),
            ),
        }
    }
}

///
/// SqlProvider
///
/// One database backend. Discovery, query text and the write pipeline all
/// go through this trait; the context picks an implementation once, at
/// construction.
///
/// Drivers behind a provider are not assumed to be thread safe. Callers
/// hold [`SqlProvider::lock`] for the duration of every command they issue.
///

#[async_trait]
pub trait SqlProvider: Send + Sync {
    fn dialect(&self) -> &dyn Dialect;

    fn lock(&self) -> &AsyncMutex<()>;

    fn schema_cache(&self) -> &SchemaCache;

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>, ProviderError>;

    fn create_command(&self, text: &str, params: Vec<CommandParameter>) -> Command {
        Command::new(text).with_params(params)
    }

    fn create_parameter(&self, param: &QueryParameter, value: Value) -> CommandParameter {
        CommandParameter {
            name: param.name.clone(),
            value,
            direction: param.direction,
            type_tag: Some(param.type_tag.clone()),
        }
    }

    /// Vendor type tag to affinity, built on first use.
    fn create_type_mappings(&self) -> &BTreeMap<String, TypeAffinity>;

    /// Affinity of a vendor type tag. Length and precision suffixes such as
    /// `nvarchar(50)` are ignored; unknown tags map to `Other`.
    fn type_affinity(&self, type_tag: &str) -> TypeAffinity {
        let base = type_tag
            .split_once('(')
            .map_or(type_tag, |(base, _)| base)
            .trim()
            .to_ascii_lowercase();

        self.create_type_mappings()
            .get(&base)
            .copied()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    fn get_tables(&self) -> Result<Vec<Table>, ProviderError>;

    fn get_descriptions(&self, table: &Table) -> Result<Descriptions, ProviderError>;

    /// Columns of `table`. Loading also caches a single-column primary key.
    fn get_columns(&self, table: &Table) -> Result<Arc<ColumnMap>, ProviderError>;

    fn get_relationships(&self, table: &Table) -> Result<RelationshipSet, ProviderError>;

    fn get_sprocs(&self) -> Result<Vec<Sproc>, ProviderError>;

    // ------------------------------------------------------------------
    // Query text
    // ------------------------------------------------------------------

    /// First `n` rows of `table`, every column.
    fn top_n_query(&self, table: &Table, n: u64) -> String {
        let dialect = self.dialect();
        let mut sql = String::from("SELECT ");
        if let Some(top) = dialect.top_clause(None, Some(n)) {
            sql.push_str(&top);
            sql.push(' ');
        }
        sql.push_str("* FROM ");
        sql.push_str(&dialect.quote_table(table));
        if let Some(paging) = dialect.paging_clause(None, Some(n), false) {
            sql.push(' ');
            sql.push_str(&paging);
        }

        sql
    }

    /// One row of `table` by its key columns. Key values bind in the order
    /// of `keys`, starting at the first parameter.
    fn individual_query(&self, table: &Table, keys: &[&str]) -> String {
        let dialect = self.dialect();
        let predicate: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(key),
                    dialect.parameter_name(index)
                )
            })
            .collect();

        let mut sql = format!("SELECT * FROM {}", dialect.quote_table(table));
        if !predicate.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.join(" AND "));
        }

        sql
    }

    /// SQL text and parameters for a flattened query.
    ///
    /// `read_async` tells the provider the rows will be read on the async
    /// path; providers whose text does not depend on it ignore the flag.
    fn generate_query_text(
        &self,
        desc: &QueryDescriptor,
        base_alias: &str,
        base_table: &Table,
        projection: &BTreeMap<String, Vec<String>>,
        read_async: bool,
    ) -> Result<GeneratedSql, ProviderError> {
        debug!(read_async, alias = base_alias, "generating query text");
        Ok(generate(
            self.dialect(),
            desc,
            base_alias,
            base_table,
            projection,
        )?)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn process_updates(
        &self,
        scope: &mut CommandScope<'_>,
        schema: &dyn SchemaSource,
        pending: &PendingChanges,
        options: &TransactionOptions,
    ) -> Result<usize, PersistError> {
        persist::apply_pending(scope, self.dialect(), schema, pending, options)
    }

    async fn process_updates_async(
        &self,
        scope: &mut CommandScope<'_>,
        schema: &dyn SchemaSource,
        pending: &PendingChanges,
        options: &TransactionOptions,
    ) -> Result<usize, PersistError> {
        persist::apply_pending_async(scope, self.dialect(), schema, pending, options).await
    }

    // ------------------------------------------------------------------
    // Stored procedures
    // ------------------------------------------------------------------

    fn execute_sproc_command(
        &self,
        scope: &mut CommandScope<'_>,
        sproc: &SprocDefinition,
        args: &[Value],
    ) -> Result<SprocResult, ProviderError> {
        let command = self.sproc_command(sproc, args)?;
        let result = scope.execute(command)?;

        Ok(result.into())
    }

    async fn execute_sproc_command_async(
        &self,
        scope: &mut CommandScope<'_>,
        sproc: &SprocDefinition,
        args: &[Value],
    ) -> Result<SprocResult, ProviderError> {
        let command = self.sproc_command(sproc, args)?;
        let result = scope.execute_async(command).await?;

        Ok(result.into())
    }

    /// Procedure call with `args` bound to the inputs in ordinal order.
    /// Outputs are bound as nulls for the driver to fill.
    fn sproc_command(&self, sproc: &SprocDefinition, args: &[Value]) -> Result<Command, ProviderError> {
        let inputs = sproc.inputs();
        if inputs.len() != args.len() {
            return Err(ProviderError::ArgumentCount {
                procedure: sproc.name.to_string(),
                expected: inputs.len(),
                actual: args.len(),
            });
        }

        let mut params: Vec<_> = inputs
            .into_iter()
            .zip(args)
            .map(|(param, arg)| self.create_parameter(param, arg.clone()))
            .collect();
        params.extend(
            sproc
                .outputs()
                .into_iter()
                .filter(|param| !param.direction.is_input())
                .map(|param| self.create_parameter(param, Value::Null)),
        );

        let mut command = self.create_command(&sproc.name.to_string(), params);
        command.is_procedure = true;

        Ok(command)
    }
}
