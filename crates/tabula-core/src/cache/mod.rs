//! Schema metadata cache with an offline JSON snapshot.
//!
//! Every map is filled at most once per key under "load if absent"
//! semantics: racing loaders may both run, and the last write wins.

mod merge;
mod snapshot;


use crate::model::{
    ColumnMap, QueryParameter, RelationshipSet, Sproc, SprocDefinition, Table,
};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error as ThisError;
use tracing::info;

pub use merge::{merge_cache_files, merge_snapshots};
pub use snapshot::SchemaSnapshot;

///
/// CacheError
///

#[derive(Debug, ThisError)]
pub enum CacheError {
    #[error("schema cache io at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("schema cache json at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

///
/// SchemaCache
///

#[derive(Debug, Default)]
pub struct SchemaCache {
    primary_keys: RwLock<BTreeMap<String, String>>,
    tables: RwLock<Option<BTreeMap<String, Table>>>,
    columns: RwLock<BTreeMap<String, Arc<ColumnMap>>>,
    relationships: RwLock<BTreeMap<String, RelationshipSet>>,
    sprocs: RwLock<Option<Vec<Sproc>>>,
    sproc_params: RwLock<BTreeMap<String, Vec<QueryParameter>>>,
    packages: RwLock<BTreeMap<String, Vec<SprocDefinition>>>,
    individuals: RwLock<Vec<String>>,
    offline: AtomicBool,
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An offline cache never consults the live catalog.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Primary keys
    // ------------------------------------------------------------------

    /// Cached key of a table with a single-column primary key.
    #[must_use]
    pub fn primary_key(&self, table: &Table) -> Option<String> {
        self.primary_keys.read().get(table.full_name()).cloned()
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    #[must_use]
    pub fn tables(&self) -> Option<Vec<Table>> {
        self.tables
            .read()
            .as_ref()
            .map(|tables| tables.values().cloned().collect())
    }

    pub fn tables_or_try_load<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<Table>, E>,
    ) -> Result<Vec<Table>, E> {
        if let Some(tables) = self.tables() {
            return Ok(tables);
        }
        let loaded = load()?;
        *self.tables.write() = Some(
            loaded
                .iter()
                .map(|table| (table.full_name().to_string(), table.clone()))
                .collect(),
        );

        Ok(loaded)
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    #[must_use]
    pub fn columns(&self, table: &Table) -> Option<Arc<ColumnMap>> {
        self.columns.read().get(table.full_name()).cloned()
    }

    /// Cached columns of `table`, loading them on first use.
    ///
    /// Loading also records the table's primary key when it is a single column.
    pub fn columns_or_try_load<E>(
        &self,
        table: &Table,
        load: impl FnOnce() -> Result<ColumnMap, E>,
    ) -> Result<Arc<ColumnMap>, E> {
        if let Some(columns) = self.columns(table) {
            return Ok(columns);
        }

        let columns = Arc::new(load()?);
        self.insert_columns(table, Arc::clone(&columns));

        Ok(columns)
    }

    pub fn insert_columns(&self, table: &Table, columns: Arc<ColumnMap>) {
        if let [key] = columns.primary_keys().as_slice() {
            self.primary_keys
                .write()
                .insert(table.full_name().to_string(), (*key).to_string());
        }
        self.columns
            .write()
            .insert(table.full_name().to_string(), columns);
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    #[must_use]
    pub fn relationships(&self, table: &Table) -> Option<RelationshipSet> {
        self.relationships.read().get(table.full_name()).cloned()
    }

    pub fn relationships_or_try_load<E>(
        &self,
        table: &Table,
        load: impl FnOnce() -> Result<RelationshipSet, E>,
    ) -> Result<RelationshipSet, E> {
        if let Some(set) = self.relationships(table) {
            return Ok(set);
        }
        let set = load()?;
        self.relationships
            .write()
            .insert(table.full_name().to_string(), set.clone());

        Ok(set)
    }

    // ------------------------------------------------------------------
    // Stored procedures
    // ------------------------------------------------------------------

    #[must_use]
    pub fn sprocs(&self) -> Option<Vec<Sproc>> {
        self.sprocs.read().clone()
    }

    /// Cached procedures, loading them on first use. Loading also indexes
    /// each definition's parameters and every package's definitions.
    pub fn sprocs_or_try_load<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<Sproc>, E>,
    ) -> Result<Vec<Sproc>, E> {
        if let Some(sprocs) = self.sprocs() {
            return Ok(sprocs);
        }
        let sprocs = load()?;

        {
            let mut params = self.sproc_params.write();
            let mut packages = self.packages.write();
            for sproc in &sprocs {
                for def in sproc.definitions() {
                    params.insert(def.name.to_string(), def.params.clone());
                }
                if let Sproc::Package(name, defs) = sproc {
                    packages.insert(name.clone(), defs.clone());
                }
            }
        }
        *self.sprocs.write() = Some(sprocs.clone());

        Ok(sprocs)
    }

    #[must_use]
    pub fn sproc_params(&self, name: &str) -> Option<Vec<QueryParameter>> {
        self.sproc_params.read().get(name).cloned()
    }

    #[must_use]
    pub fn package(&self, name: &str) -> Option<Vec<SprocDefinition>> {
        self.packages.read().get(name).cloned()
    }

    // ------------------------------------------------------------------
    // Individuals
    // ------------------------------------------------------------------

    /// Remember that single-row lookups were made against `table`.
    pub fn record_individual(&self, table: &Table) {
        let mut individuals = self.individuals.write();
        if !individuals.iter().any(|name| name == table.full_name()) {
            individuals.push(table.full_name().to_string());
        }
    }

    #[must_use]
    pub fn individuals(&self) -> Vec<String> {
        self.individuals.read().clone()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            primary_keys: self.primary_keys.read().clone(),
            tables: self.tables.read().clone().unwrap_or_default(),
            columns: self
                .columns
                .read()
                .iter()
                .map(|(name, columns)| (name.clone(), ColumnMap::clone(columns)))
                .collect(),
            relationships: self.relationships.read().clone(),
            sprocs: self.sprocs.read().clone().unwrap_or_default(),
            sprocs_params: self.sproc_params.read().clone(),
            packages: self.packages.read().clone(),
            individuals: self.individuals.read().clone(),
            is_offline: self.is_offline(),
        }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Self {
        let has_tables = !snapshot.tables.is_empty();
        let has_sprocs = !snapshot.sprocs.is_empty();

        Self {
            primary_keys: RwLock::new(snapshot.primary_keys),
            tables: RwLock::new(has_tables.then_some(snapshot.tables)),
            columns: RwLock::new(
                snapshot
                    .columns
                    .into_iter()
                    .map(|(name, columns)| (name, Arc::new(columns)))
                    .collect(),
            ),
            relationships: RwLock::new(snapshot.relationships),
            sprocs: RwLock::new(has_sprocs.then_some(snapshot.sprocs)),
            sproc_params: RwLock::new(snapshot.sprocs_params),
            packages: RwLock::new(snapshot.packages),
            individuals: RwLock::new(snapshot.individuals),
            offline: AtomicBool::new(snapshot.is_offline),
        }
    }

    /// Write the current contents to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        Self::write_snapshot(path, &snapshot)?;
        info!(
            path = %path.display(),
            tables = snapshot.columns.len(),
            "saved schema cache"
        );

        Ok(())
    }

    /// Load a saved cache. Loaded caches are offline.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let mut snapshot = Self::read_snapshot(path.as_ref())?;
        snapshot.is_offline = true;

        Ok(Self::from_snapshot(snapshot))
    }

    pub(crate) fn read_snapshot(path: &Path) -> Result<SchemaSnapshot, CacheError> {
        let text = fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn write_snapshot(path: &Path, snapshot: &SchemaSnapshot) -> Result<(), CacheError> {
        let text = serde_json::to_string_pretty(snapshot).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, text).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
