//! SQL Server backend.

mod dialect;

pub use dialect::MsSqlDialect;

use crate::{
    cache::SchemaCache,
    driver::{Connection, ConnectionFactory, Descriptions, RawColumn, SchemaDiscovery},
    model::{Column, ColumnMap, RelationshipSet, Sproc, Table, TypeAffinity},
    sql::{Dialect, ProviderError, SqlProvider},
};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock},
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

const TYPE_MAPPINGS: &[(&str, TypeAffinity)] = &[
    ("bit", TypeAffinity::Boolean),
    ("tinyint", TypeAffinity::Integer),
    ("smallint", TypeAffinity::Integer),
    ("int", TypeAffinity::Integer),
    ("bigint", TypeAffinity::Integer),
    ("real", TypeAffinity::Float),
    ("float", TypeAffinity::Float),
    ("decimal", TypeAffinity::Decimal),
    ("numeric", TypeAffinity::Decimal),
    ("money", TypeAffinity::Decimal),
    ("smallmoney", TypeAffinity::Decimal),
    ("char", TypeAffinity::Text),
    ("nchar", TypeAffinity::Text),
    ("varchar", TypeAffinity::Text),
    ("nvarchar", TypeAffinity::Text),
    ("text", TypeAffinity::Text),
    ("ntext", TypeAffinity::Text),
    ("xml", TypeAffinity::Text),
    ("date", TypeAffinity::Date),
    ("datetime", TypeAffinity::DateTime),
    ("datetime2", TypeAffinity::DateTime),
    ("smalldatetime", TypeAffinity::DateTime),
    ("datetimeoffset", TypeAffinity::DateTime),
    ("binary", TypeAffinity::Binary),
    ("varbinary", TypeAffinity::Binary),
    ("image", TypeAffinity::Binary),
    ("rowversion", TypeAffinity::Binary),
    ("timestamp", TypeAffinity::Binary),
    ("uniqueidentifier", TypeAffinity::Guid),
];

///
/// MsSqlProvider
///
/// Connections come from the injected factory and live metadata from the
/// injected discovery; both are consulted only while the cache is online.
///

pub struct MsSqlProvider {
    factory: Arc<dyn ConnectionFactory>,
    discovery: Arc<dyn SchemaDiscovery>,
    cache: Arc<SchemaCache>,
    dialect: MsSqlDialect,
    lock: AsyncMutex<()>,
    type_mappings: OnceLock<BTreeMap<String, TypeAffinity>>,
}

impl MsSqlProvider {
    #[must_use]
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        discovery: Arc<dyn SchemaDiscovery>,
        cache: Arc<SchemaCache>,
    ) -> Self {
        Self {
            factory,
            discovery,
            cache,
            dialect: MsSqlDialect,
            lock: AsyncMutex::new(()),
            type_mappings: OnceLock::new(),
        }
    }

    fn offline(&self, what: &'static str, target: impl Into<String>) -> ProviderError {
        let target = target.into();
        warn!(what, target = %target, "schema metadata missing from offline cache");

        ProviderError::OfflineMetadata { what, target }
    }

    fn column(&self, raw: RawColumn) -> Column {
        Column {
            affinity: self.type_affinity(&raw.type_tag),
            name: raw.name,
            type_tag: raw.type_tag,
            is_nullable: raw.is_nullable,
            is_primary_key: raw.is_primary_key,
            is_identity: raw.is_identity,
        }
    }

    fn discover_columns(&self, table: &Table) -> Result<ColumnMap, ProviderError> {
        let raw = self.discovery.columns(table)?;
        if raw.is_empty() {
            return Err(ProviderError::UnknownTable {
                table: table.full_name().to_string(),
            });
        }
        debug!(table = %table, columns = raw.len(), "discovered columns");

        Ok(raw.into_iter().map(|raw| self.column(raw)).collect())
    }
}

impl std::fmt::Debug for MsSqlProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsSqlProvider")
            .field("offline", &self.cache.is_offline())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SqlProvider for MsSqlProvider {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn lock(&self) -> &AsyncMutex<()> {
        &self.lock
    }

    fn schema_cache(&self) -> &SchemaCache {
        &self.cache
    }

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>, ProviderError> {
        Ok(self.factory.connect(connection_string)?)
    }

    fn create_type_mappings(&self) -> &BTreeMap<String, TypeAffinity> {
        self.type_mappings.get_or_init(|| {
            TYPE_MAPPINGS
                .iter()
                .map(|(tag, affinity)| ((*tag).to_string(), *affinity))
                .collect()
        })
    }

    fn get_tables(&self) -> Result<Vec<Table>, ProviderError> {
        if self.cache.is_offline() {
            return self.cache.tables().ok_or_else(|| self.offline("tables", "catalog"));
        }

        self.cache
            .tables_or_try_load(|| self.discovery.tables().map_err(ProviderError::from))
    }

    fn get_descriptions(&self, table: &Table) -> Result<Descriptions, ProviderError> {
        if self.cache.is_offline() {
            return Err(self.offline("descriptions", table.full_name()));
        }

        Ok(self.discovery.descriptions(table)?)
    }

    fn get_columns(&self, table: &Table) -> Result<Arc<ColumnMap>, ProviderError> {
        if self.cache.is_offline() {
            return self
                .cache
                .columns(table)
                .ok_or_else(|| self.offline("columns", table.full_name()));
        }

        self.cache
            .columns_or_try_load(table, || self.discover_columns(table))
    }

    fn get_relationships(&self, table: &Table) -> Result<RelationshipSet, ProviderError> {
        if self.cache.is_offline() {
            return self
                .cache
                .relationships(table)
                .ok_or_else(|| self.offline("relationships", table.full_name()));
        }

        self.cache
            .relationships_or_try_load(table, || -> Result<_, ProviderError> {
                let found = self.discovery.relationships(table)?;
                Ok(RelationshipSet::partition(table, found))
            })
    }

    fn get_sprocs(&self) -> Result<Vec<Sproc>, ProviderError> {
        if self.cache.is_offline() {
            return self
                .cache
                .sprocs()
                .ok_or_else(|| self.offline("stored procedures", "catalog"));
        }

        self.cache
            .sprocs_or_try_load(|| self.discovery.sprocs().map_err(ProviderError::from))
    }
}
