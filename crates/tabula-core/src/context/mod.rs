//! The `DataContext` facade: one provider, its schema cache, the pending
//! set and the observers wired together behind a single entry point.


use crate::{
    DEFAULT_TOP_ROWS,
    cache::SchemaCache,
    config::ContextConfig,
    driver::{Command, CommandParameter, CommandResult, ConnectionFactory, ResultSet, SchemaDiscovery},
    entity::{ChangeTracker, CloneMode, Entity, EntityId, EntityRef},
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{ColumnMap, RelationshipSet, Sproc, SprocDefinition, Table},
    obs::{EventRegistry, SubscriptionId, connection_hash},
    persist::{ConflictPolicy, PendingChanges, SchemaSource, TransactionOptions},
    query::{Query, QueryDescriptor},
    sql::{
        CommandScope, GeneratedSql, GroupedLayout, GroupedRow, MsSqlProvider, ProviderError,
        SprocResult, SqlProvider,
    },
    value::{FromValue, Value},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, info, warn};

/// Callback raised after every tracked column edit.
pub type PropertyObserver = Arc<dyn Fn(&EntityRef, &str) + Send + Sync>;

///
/// CompiledQuery
///
/// A normalized query and the SQL the provider generated for it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub descriptor: QueryDescriptor,
    pub sql: GeneratedSql,
}

impl CompiledQuery {
    /// Table the result rows materialize as.
    #[must_use]
    pub fn result_table(&self) -> &Table {
        self.descriptor
            .ultimate_child
            .as_ref()
            .map_or(&self.descriptor.base_table, |(_, table)| table)
    }
}

///
/// ContextShared
///
/// The part of a context entities hold on to: every tracked edit lands
/// here, and the write pipeline reads metadata through it.
///

struct ContextShared {
    provider: Arc<dyn SqlProvider>,
    pending: PendingChanges,
    next_observer: AtomicU64,
    observers: RwLock<BTreeMap<SubscriptionId, PropertyObserver>>,
}

impl ChangeTracker for ContextShared {
    fn track(&self, entity: &EntityRef) {
        self.pending.mark(entity);
    }

    fn forget(&self, id: EntityId) {
        self.pending.remove(id);
    }

    fn column_changed(&self, entity: &EntityRef, column: &str) {
        let observers: Vec<PropertyObserver> = self.observers.read().values().cloned().collect();
        for observer in observers {
            observer(entity, column);
        }
    }

    fn column_model(&self, table: &Table) -> Option<Arc<ColumnMap>> {
        self.provider.get_columns(table).ok()
    }
}

impl SchemaSource for ContextShared {
    fn columns(&self, table: &Table) -> Result<Arc<ColumnMap>, ProviderError> {
        self.provider.get_columns(table)
    }

    // an offline snapshot without relationships for a table writes it unordered
    fn relationships(&self, table: &Table) -> Result<RelationshipSet, ProviderError> {
        match self.provider.get_relationships(table) {
            Err(ProviderError::OfflineMetadata { .. }) => {
                warn!(table = %table, "no cached relationships; writing without dependency order");
                Ok(RelationshipSet::default())
            }
            other => other,
        }
    }
}

///
/// DataContext
///
/// Session over one database. Reads materialize change-tracked entities
/// owned by this context; edits accumulate in its pending set until
/// [`DataContext::submit_updates`] writes them in one transaction.
///
/// Every command is issued while holding the provider lock. The blocking
/// methods take that lock with `blocking_lock` and panic when called from
/// inside a tokio runtime; async callers use the `_async` variants.
///

pub struct DataContext {
    shared: Arc<ContextShared>,
    tracker: Arc<dyn ChangeTracker>,
    events: Arc<EventRegistry>,
    connection_string: String,
    connection_hash: String,
    options: TransactionOptions,
    default_conflict: ConflictPolicy,
    schema_cache_path: Option<PathBuf>,
}

impl DataContext {
    #[must_use]
    pub fn new(
        provider: Arc<dyn SqlProvider>,
        connection_string: impl Into<String>,
        events: Arc<EventRegistry>,
    ) -> Self {
        let connection_string = connection_string.into();
        let shared = Arc::new(ContextShared {
            provider,
            pending: PendingChanges::new(),
            next_observer: AtomicU64::new(0),
            observers: RwLock::new(BTreeMap::new()),
        });
        let tracker: Arc<dyn ChangeTracker> = shared.clone();

        Self {
            shared,
            tracker,
            events,
            connection_hash: connection_hash(&connection_string),
            connection_string,
            options: TransactionOptions::default(),
            default_conflict: ConflictPolicy::default(),
            schema_cache_path: None,
        }
    }

    /// SQL Server context built from configuration.
    ///
    /// With `use_offline_cache` the schema snapshot is loaded from
    /// `schema_cache_path` and the live catalog is never consulted.
    pub fn from_config(
        config: &ContextConfig,
        factory: Arc<dyn ConnectionFactory>,
        discovery: Arc<dyn SchemaDiscovery>,
        events: Arc<EventRegistry>,
    ) -> Result<Self, InternalError> {
        config.validate()?;

        let cache = match &config.schema_cache_path {
            Some(path) if config.use_offline_cache => {
                info!(path = %path.display(), "loading offline schema cache");
                SchemaCache::load(path)?
            }
            _ => SchemaCache::new(),
        };
        let provider = MsSqlProvider::new(factory, discovery, Arc::new(cache));

        let mut context = Self::new(Arc::new(provider), config.connection_string.clone(), events)
            .transaction_options(config.transaction_options())
            .default_conflict(config.persistence.default_conflict);
        context.schema_cache_path.clone_from(&config.schema_cache_path);

        Ok(context)
    }

    #[must_use]
    pub const fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Conflict policy given to entities created through this context.
    #[must_use]
    pub const fn default_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.default_conflict = policy;
        self
    }

    #[must_use]
    pub fn schema_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_cache_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn SqlProvider> {
        &self.shared.provider
    }

    #[must_use]
    pub fn schema_cache(&self) -> &SchemaCache {
        self.shared.provider.schema_cache()
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventRegistry> {
        &self.events
    }

    // ---------------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------------

    /// New row for `table`, tracked for insertion.
    pub fn create_entity(&self, table: &Table) -> Result<EntityRef, InternalError> {
        let columns = self.shared.provider.get_columns(table)?;
        let entity = Entity::create(table.clone(), columns, Some(&self.tracker));
        entity.set_on_conflict(self.default_conflict);

        Ok(entity)
    }

    /// Copy of `entity` owned by this context.
    #[must_use]
    pub fn clone_entity(&self, entity: &EntityRef, mode: CloneMode) -> EntityRef {
        entity.clone_to_context(mode, Some(&self.tracker))
    }

    #[must_use]
    pub fn pending_entities(&self) -> Vec<EntityRef> {
        self.shared.pending.snapshot()
    }

    /// Abandon every pending edit. Rows already in the database are untouched.
    pub fn clear_pending_changes(&self) -> usize {
        let cleared = self.shared.pending.clear();
        debug!(cleared, "pending changes discarded");

        cleared
    }

    pub fn subscribe_property_changes(
        &self,
        observer: impl Fn(&EntityRef, &str) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId::from_raw(self.shared.next_observer.fetch_add(1, Ordering::Relaxed));
        self.shared.observers.write().insert(id, Arc::new(observer));

        id
    }

    pub fn unsubscribe_property_changes(&self, id: SubscriptionId) -> bool {
        self.shared.observers.write().remove(&id).is_some()
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn compile(&self, query: &Query) -> Result<CompiledQuery, InternalError> {
        self.compile_for(query, false)
    }

    fn compile_for(&self, query: &Query, read_async: bool) -> Result<CompiledQuery, InternalError> {
        let descriptor = query.flatten()?;
        let projection = descriptor.projection_columns();
        let sql = self.shared.provider.generate_query_text(
            &descriptor,
            &descriptor.base_alias,
            &descriptor.base_table,
            &projection,
            read_async,
        )?;

        Ok(CompiledQuery { descriptor, sql })
    }

    /// Rows of a plain (ungrouped, uncounted) query.
    pub fn execute_query(&self, query: &Query) -> Result<Vec<EntityRef>, InternalError> {
        let compiled = self.compile(query)?;
        ensure_row_query(&compiled.descriptor)?;
        let table = compiled.result_table().clone();
        let columns = self.shared.provider.get_columns(&table)?;

        let text = compiled.sql.text.clone();
        let result = self.run(compiled.sql.into_command())?;
        let set = expect_rows(&text, result)?;

        Ok(self.materialize(&table, &columns, &set))
    }

    pub async fn execute_query_async(&self, query: &Query) -> Result<Vec<EntityRef>, InternalError> {
        let compiled = self.compile_for(query, true)?;
        ensure_row_query(&compiled.descriptor)?;
        let table = compiled.result_table().clone();
        let columns = self.shared.provider.get_columns(&table)?;

        let text = compiled.sql.text.clone();
        let result = self.run_async(compiled.sql.into_command()).await?;
        let set = expect_rows(&text, result)?;

        Ok(self.materialize(&table, &columns, &set))
    }

    /// Groups of a grouped query, one [`GroupedRow`] per result row.
    ///
    /// Each group carries one entity per alias that contributed a key or
    /// an aggregate, holding that alias's output columns.
    pub fn execute_grouped(&self, query: &Query) -> Result<Vec<GroupedRow>, InternalError> {
        let compiled = self.compile(query)?;
        let desc = &compiled.descriptor;
        if !desc.is_grouped() {
            return Err(InternalError::query_unsupported(
                "execute_grouped needs a query with group_by",
            ));
        }
        let layout = GroupedLayout::of(desc);

        let text = compiled.sql.text.clone();
        let result = self.run(compiled.sql.into_command())?;
        let set = expect_rows(&text, result)?;

        let mut aliases: Vec<&str> = Vec::new();
        let referenced = layout
            .keys
            .iter()
            .map(|(col, _)| col.alias.as_str())
            .chain(layout.aggregates.iter().map(|(_, col, _)| col.alias.as_str()));
        for alias in referenced {
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        let groups = set
            .records()
            .map(|record| {
                let values: HashMap<String, Value> = record.into_iter().collect();
                let read = |name: &str| values.get(name).cloned().unwrap_or(Value::Null);

                let key = layout.keys.iter().map(|(_, name)| read(name.as_str())).collect();
                let rows = aliases
                    .iter()
                    .map(|alias| {
                        let table = desc.aliases.get(*alias).unwrap_or(&desc.base_table);
                        let columns = self.schema_cache().columns(table).unwrap_or_default();
                        let names = layout
                            .keys
                            .iter()
                            .filter(|(col, _)| col.alias == *alias)
                            .map(|(_, name)| name)
                            .chain(
                                layout
                                    .aggregates
                                    .iter()
                                    .filter(|(_, col, _)| col.alias == *alias)
                                    .map(|(_, _, name)| name),
                            );

                        Entity::materialize(
                            table.clone(),
                            columns,
                            names.map(|name| (name.clone(), read(name.as_str()))),
                            Some(&self.tracker),
                        )
                    })
                    .collect();

                GroupedRow::new(key, rows)
            })
            .collect();

        Ok(groups)
    }

    /// First value of a count or aggregate query. SQL-null reads as the
    /// type's default.
    pub fn execute_scalar<T: FromValue>(&self, query: &Query) -> Result<T, InternalError> {
        let compiled = self.compile(query)?;
        let result = self.run(compiled.sql.into_command())?;

        match scalar_of(result) {
            Value::Null => Ok(T::null_default()),
            value => Ok(T::from_value(&value)?),
        }
    }

    /// First `n` rows of `table`, or [`DEFAULT_TOP_ROWS`] of them.
    pub fn top_rows(&self, table: &Table, n: Option<u64>) -> Result<Vec<EntityRef>, InternalError> {
        let columns = self.shared.provider.get_columns(table)?;
        let text = self.shared.provider.top_n_query(table, n.unwrap_or(DEFAULT_TOP_ROWS));

        let result = self.run(self.shared.provider.create_command(&text, Vec::new()))?;
        let set = expect_rows(&text, result)?;

        Ok(self.materialize(table, &columns, &set))
    }

    /// Row of `table` by its single-column primary key.
    pub fn individual(
        &self,
        table: &Table,
        key: impl Into<Value>,
    ) -> Result<Option<EntityRef>, InternalError> {
        let columns = self.shared.provider.get_columns(table)?;
        let pk = match self.schema_cache().primary_key(table) {
            Some(pk) => pk,
            None => match columns.primary_keys().as_slice() {
                [pk] => (*pk).to_string(),
                _ => {
                    return Err(InternalError::new(
                        ErrorClass::Unsupported,
                        ErrorOrigin::Provider,
                        format!("{table} has no single-column primary key"),
                    ));
                }
            },
        };

        self.individual_by(table, &[(pk.as_str(), key.into())])
    }

    /// Row of `table` matching every `(column, value)` pair.
    pub fn individual_by(
        &self,
        table: &Table,
        keys: &[(&str, Value)],
    ) -> Result<Option<EntityRef>, InternalError> {
        let provider = &self.shared.provider;
        let columns = provider.get_columns(table)?;
        self.schema_cache().record_individual(table);

        let names: Vec<&str> = keys.iter().map(|(name, _)| *name).collect();
        let text = provider.individual_query(table, &names);
        let params = keys
            .iter()
            .enumerate()
            .map(|(index, (_, value))| {
                CommandParameter::input(provider.dialect().parameter_name(index), value.clone())
            })
            .collect();

        let result = self.run(provider.create_command(&text, params))?;
        let set = expect_rows(&text, result)?;

        Ok(self.materialize(table, &columns, &set).into_iter().next())
    }

    // ---------------------------------------------------------------------
    // Stored procedures
    // ---------------------------------------------------------------------

    /// Call a discovered procedure by its qualified or bare name.
    ///
    /// Blocks on the provider lock; panics inside a tokio runtime.
    pub fn execute_sproc(&self, name: &str, args: &[Value]) -> Result<SprocResult, InternalError> {
        let sproc = self.sproc_definition(name)?;

        let _guard = self.shared.provider.lock().blocking_lock();
        let mut scope = self.scope()?;

        Ok(self
            .shared
            .provider
            .execute_sproc_command(&mut scope, &sproc, args)?)
    }

    pub async fn execute_sproc_async(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<SprocResult, InternalError> {
        let sproc = self.sproc_definition(name)?;

        let _guard = self.shared.provider.lock().lock().await;
        let mut scope = self.scope()?;

        Ok(self
            .shared
            .provider
            .execute_sproc_command_async(&mut scope, &sproc, args)
            .await?)
    }

    fn sproc_definition(&self, name: &str) -> Result<SprocDefinition, InternalError> {
        let sprocs = self.shared.provider.get_sprocs()?;

        sprocs
            .iter()
            .flat_map(Sproc::definitions)
            .find(|def| {
                def.name.to_string().eq_ignore_ascii_case(name)
                    || def.name.name.eq_ignore_ascii_case(name)
            })
            .cloned()
            .ok_or_else(|| InternalError::provider_not_found(format!("stored procedure '{name}'")))
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Write every pending entity in one transaction. Returns the number
    /// of statements issued.
    ///
    /// Blocks on the provider lock; panics inside a tokio runtime. Use
    /// [`DataContext::submit_updates_async`] from async code.
    pub fn submit_updates(&self) -> Result<usize, InternalError> {
        if self.shared.pending.is_empty() {
            return Ok(0);
        }

        let _guard = self.shared.provider.lock().blocking_lock();
        let mut scope = self.scope()?;

        Ok(self.shared.provider.process_updates(
            &mut scope,
            &*self.shared,
            &self.shared.pending,
            &self.options,
        )?)
    }

    pub async fn submit_updates_async(&self) -> Result<usize, InternalError> {
        if self.shared.pending.is_empty() {
            return Ok(0);
        }

        let _guard = self.shared.provider.lock().lock().await;
        let mut scope = self.scope()?;

        Ok(self
            .shared
            .provider
            .process_updates_async(
                &mut scope,
                &*self.shared,
                &self.shared.pending,
                &self.options,
            )
            .await?)
    }

    // ---------------------------------------------------------------------
    // Schema cache
    // ---------------------------------------------------------------------

    /// Save the schema cache to the configured `schema_cache_path`.
    pub fn save_schema_cache(&self) -> Result<PathBuf, InternalError> {
        let Some(path) = self.schema_cache_path.clone() else {
            return Err(InternalError::new(
                ErrorClass::InvalidOperation,
                ErrorOrigin::Config,
                "no schema_cache_path configured",
            ));
        };
        self.save_schema_cache_to(&path)?;

        Ok(path)
    }

    pub fn save_schema_cache_to(&self, path: impl AsRef<Path>) -> Result<(), InternalError> {
        self.schema_cache().save(path)?;

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    fn scope(&self) -> Result<CommandScope<'_>, InternalError> {
        let connection = self
            .shared
            .provider
            .create_connection(&self.connection_string)?;

        Ok(CommandScope::new(
            connection,
            &self.events,
            &self.connection_hash,
            self.options.timeout,
        ))
    }

    // blocking; every sync read goes through here
    fn run(&self, command: Command) -> Result<CommandResult, InternalError> {
        let _guard = self.shared.provider.lock().blocking_lock();
        let mut scope = self.scope()?;

        Ok(scope.execute(command)?)
    }

    async fn run_async(&self, command: Command) -> Result<CommandResult, InternalError> {
        let _guard = self.shared.provider.lock().lock().await;
        let mut scope = self.scope()?;

        Ok(scope.execute_async(command).await?)
    }

    fn materialize(&self, table: &Table, columns: &Arc<ColumnMap>, set: &ResultSet) -> Vec<EntityRef> {
        set.records()
            .map(|record| {
                Entity::materialize(
                    table.clone(),
                    Arc::clone(columns),
                    record,
                    Some(&self.tracker),
                )
            })
            .collect()
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("connection", &self.connection_hash)
            .field("pending", &self.shared.pending.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// Grouped, counted and aggregate queries do not produce entity rows.
fn ensure_row_query(desc: &QueryDescriptor) -> Result<(), InternalError> {
    if desc.is_grouped() {
        return Err(InternalError::query_unsupported(
            "grouped queries are read with execute_grouped",
        ));
    }
    if desc.count || !desc.aggregate_ops.is_empty() {
        return Err(InternalError::query_unsupported(
            "count and aggregate queries are read with execute_scalar",
        ));
    }

    Ok(())
}

fn expect_rows(command: &str, result: CommandResult) -> Result<ResultSet, ProviderError> {
    match result {
        CommandResult::Rows(set) => Ok(set),
        other => Err(ProviderError::UnexpectedResult {
            command: command.to_string(),
            detail: format!("expected rows, got {}", result_kind(&other)),
        }),
    }
}

const fn result_kind(result: &CommandResult) -> &'static str {
    match result {
        CommandResult::Rows(_) => "rows",
        CommandResult::Affected(_) => "an affected-row count",
        CommandResult::Scalar(_) => "a scalar",
        CommandResult::Sets(_) => "multiple result sets",
    }
}

fn scalar_of(result: CommandResult) -> Value {
    match result {
        CommandResult::Scalar(value) => value,
        CommandResult::Rows(set) => set.first_value().cloned().unwrap_or(Value::Null),
        CommandResult::Affected(count) => Value::Int(i64::try_from(count).unwrap_or(i64::MAX)),
        CommandResult::Sets(sets) => sets
            .into_iter()
            .next()
            .map_or(Value::Null, |(_, result)| scalar_of(result)),
    }
}
