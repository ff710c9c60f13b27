//! Schema-agnostic row records with per-column change tracking.
//!
//! An [`Entity`] is always handled through an [`EntityRef`]; edits route the
//! record to its owning context's pending set through [`ChangeTracker`].

mod alias;
mod clone;
mod mapping;
mod state;

#[cfg(test)]
mod tests;

use crate::{
    model::{Column, ColumnMap, Relationship, Table},
    persist::ConflictPolicy,
    value::{CoercionError, FromValue, Value},
};
use derive_more::Display;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use thiserror::Error as ThisError;

pub use alias::strip_alias;
pub use clone::CloneMode;
pub use mapping::RowTarget;
pub use state::EntityState;

/// Shared handle to one entity record.
pub type EntityRef = Arc<Entity>;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

///
/// EntityId
///
/// Process-unique identity of an entity record; keys the pending set.
/// Ids are handed out in creation order.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

///
/// EntityError
///

#[derive(Debug, ThisError)]
pub enum EntityError {
    #[error("cannot edit column '{column}' of {table}: entity is {state}")]
    InvalidOperation {
        table: Table,
        column: String,
        state: &'static str,
    },

    #[error("unknown column '{column}' on {table}")]
    UnknownColumn { table: Table, column: String },

    #[error("column '{column}' of {table}: {source}")]
    Coercion {
        table: Table,
        column: String,
        source: CoercionError,
    },

    #[error("relationship '{relationship}' does not link {parent} to {child}")]
    RelationshipMismatch {
        relationship: String,
        parent: Table,
        child: Table,
    },

    #[error("cannot map column '{column}' onto field '{field}': {source}")]
    Mapping {
        column: String,
        field: String,
        source: CoercionError,
    },
}

///
/// ChangeTracker
///
/// Owning-context side of an entity: receives every tracked edit.
/// Implementations must tolerate concurrent calls from many producers.
///

pub trait ChangeTracker: Send + Sync {
    /// Record `entity` as needing submission.
    fn track(&self, entity: &EntityRef);

    /// Drop an entity from the pending set without persisting it.
    fn forget(&self, id: EntityId);

    /// Property-change notification raised after every tracked edit.
    fn column_changed(&self, _entity: &EntityRef, _column: &str) {}

    /// Column model for `table`, if the owner has it loaded.
    fn column_model(&self, _table: &Table) -> Option<Arc<ColumnMap>> {
        None
    }
}

///
/// ParentLink
///
/// Pending foreign-key reference to a parent row that may not have its key yet.
///

#[derive(Clone)]
pub(crate) struct ParentLink {
    pub(crate) relationship: Relationship,
    pub(crate) parent: EntityRef,
}

struct EntityInner {
    values: BTreeMap<String, Value>,
    state: EntityState,
    on_conflict: ConflictPolicy,
    aliases: HashMap<String, EntityRef>,
    links: Vec<ParentLink>,
}

///
/// Entity
///
/// One database row, or a virtual row carved out of a joined result.
///

pub struct Entity {
    id: EntityId,
    table: Table,
    columns: Arc<ColumnMap>,
    tracker: Option<Weak<dyn ChangeTracker>>,
    inner: Mutex<EntityInner>,
}

impl Entity {
    fn build(
        table: Table,
        columns: Arc<ColumnMap>,
        values: BTreeMap<String, Value>,
        state: EntityState,
        tracker: Option<Weak<dyn ChangeTracker>>,
    ) -> EntityRef {
        Arc::new(Self {
            id: EntityId::next(),
            table,
            columns,
            tracker,
            inner: Mutex::new(EntityInner {
                values,
                state,
                on_conflict: ConflictPolicy::default(),
                aliases: HashMap::new(),
                links: Vec::new(),
            }),
        })
    }

    /// Materialize a loaded row. Values are stored silently; state is `Unchanged`.
    pub fn materialize<I, S>(
        table: Table,
        columns: Arc<ColumnMap>,
        values: I,
        tracker: Option<&Arc<dyn ChangeTracker>>,
    ) -> EntityRef
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        Self::build(
            table,
            columns,
            values,
            EntityState::Unchanged,
            tracker.map(Arc::downgrade),
        )
    }

    /// Construct a new row to be inserted. The row is tracked immediately.
    pub fn create(
        table: Table,
        columns: Arc<ColumnMap>,
        tracker: Option<&Arc<dyn ChangeTracker>>,
    ) -> EntityRef {
        let entity = Self::build(
            table,
            columns,
            BTreeMap::new(),
            EntityState::Created,
            tracker.map(Arc::downgrade),
        );
        if let Some(tracker) = tracker {
            tracker.track(&entity);
        }

        entity
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &Arc<ColumnMap> {
        &self.columns
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        self.inner.lock().state.clone()
    }

    #[must_use]
    pub fn on_conflict(&self) -> ConflictPolicy {
        self.inner.lock().on_conflict
    }

    pub fn set_on_conflict(&self, policy: ConflictPolicy) {
        self.inner.lock().on_conflict = policy;
    }

    fn tracker(&self) -> Option<Arc<dyn ChangeTracker>> {
        self.tracker.as_ref().and_then(Weak::upgrade)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Typed read. Absent and SQL-null columns read as the type's default.
    pub fn get_column<T: FromValue>(&self, column: &str) -> Result<T, EntityError> {
        let inner = self.inner.lock();
        match inner.values.get(column) {
            None | Some(Value::Null) => Ok(T::null_default()),
            Some(value) => T::from_value(value).map_err(|source| self.coercion(column, source)),
        }
    }

    /// Typed read that keeps absence distinct.
    pub fn get_column_option<T: FromValue>(&self, column: &str) -> Result<Option<T>, EntityError> {
        let inner = self.inner.lock();
        match inner.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .map_err(|source| self.coercion(column, source)),
        }
    }

    #[must_use]
    pub fn get_value(&self, column: &str) -> Option<Value> {
        self.inner.lock().values.get(column).cloned()
    }

    /// True if the column is present and not SQL-null.
    #[must_use]
    pub fn has_value(&self, column: &str) -> bool {
        self.inner
            .lock()
            .values
            .get(column)
            .is_some_and(|value| !value.is_null())
    }

    #[must_use]
    pub fn column_values(&self) -> Vec<(String, Value)> {
        self.inner
            .lock()
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Values paired with their column descriptor; dynamic columns have none.
    #[must_use]
    pub fn column_values_with_definition(&self) -> Vec<(String, Value, Option<Column>)> {
        self.column_values()
            .into_iter()
            .map(|(name, value)| {
                let column = self.columns.get(&name).cloned();
                (name, value, column)
            })
            .collect()
    }

    /// Primary-key columns with their current values.
    #[must_use]
    pub fn primary_key_values(&self) -> Vec<(String, Option<Value>)> {
        let inner = self.inner.lock();
        self.columns
            .primary_keys()
            .into_iter()
            .map(|name| {
                let value = inner.values.get(name).filter(|v| !v.is_null()).cloned();
                (name.to_string(), value)
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Tracked writes
    // ---------------------------------------------------------------------

    /// Set a column with coercion to its declared affinity and mark it changed.
    pub fn set_column(
        self: &Arc<Self>,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<(), EntityError> {
        self.write_tracked(column, Some(value.into()))
    }

    /// Set a column from an optional value; `None` removes the entry.
    pub fn set_column_option<V: Into<Value>>(
        self: &Arc<Self>,
        column: &str,
        value: Option<V>,
    ) -> Result<(), EntityError> {
        self.write_tracked(column, value.map(Into::into))
    }

    fn write_tracked(self: &Arc<Self>, column: &str, value: Option<Value>) -> Result<(), EntityError> {
        self.check_editable(column)?;
        let value = value.map(|value| self.coerce_for(column, value)).transpose()?;

        {
            let mut inner = self.inner.lock();
            // state may have moved while coercing
            if !inner.state.accepts_edits() {
                return Err(self.invalid_operation(column, &inner.state));
            }
            match value {
                Some(value) => {
                    inner.values.insert(column.to_string(), value);
                }
                None => {
                    inner.values.remove(column);
                }
            }
            inner.state.record_edit(column);
        }

        if let Some(tracker) = self.tracker() {
            tracker.track(self);
            tracker.column_changed(self, column);
        }

        Ok(())
    }

    fn check_editable(&self, column: &str) -> Result<(), EntityError> {
        let inner = self.inner.lock();
        if inner.state.accepts_edits() {
            Ok(())
        } else {
            Err(self.invalid_operation(column, &inner.state))
        }
    }

    fn coerce_for(&self, column: &str, value: Value) -> Result<Value, EntityError> {
        if self.columns.is_empty() {
            return Ok(value);
        }
        let Some(def) = self.columns.get(column) else {
            return Err(EntityError::UnknownColumn {
                table: self.table.clone(),
                column: column.to_string(),
            });
        };

        value
            .coerce_to(def.affinity)
            .map_err(|source| self.coercion(column, source))
    }

    /// Mark for deletion. A never-inserted row is discarded outright.
    pub fn delete(self: &Arc<Self>) {
        let discarded = {
            let mut inner = self.inner.lock();
            match inner.state {
                EntityState::Created => {
                    inner.state = EntityState::Deleted;
                    true
                }
                EntityState::Unchanged | EntityState::Modified(_) => {
                    inner.state = EntityState::Delete;
                    false
                }
                EntityState::Delete | EntityState::Deleted => return,
            }
        };

        if let Some(tracker) = self.tracker() {
            if discarded {
                tracker.forget(self.id);
            } else {
                tracker.track(self);
            }
        }
    }

    /// Reference `parent` through `relationship`.
    ///
    /// Known parent key values are copied into this row's foreign-key
    /// columns now; the link is kept so the write pipeline can fill keys the
    /// database assigns when the parent is inserted in the same batch.
    pub fn link_parent(
        self: &Arc<Self>,
        relationship: &Relationship,
        parent: &EntityRef,
    ) -> Result<(), EntityError> {
        if relationship.foreign_table != self.table || relationship.primary_table != parent.table {
            return Err(EntityError::RelationshipMismatch {
                relationship: relationship.name.clone(),
                parent: parent.table.clone(),
                child: self.table.clone(),
            });
        }

        for (pk, fk) in relationship.key_pairs() {
            if let Some(value) = parent.get_value(pk).filter(|v| !v.is_null()) {
                self.set_column(fk, value)?;
            }
        }

        self.inner.lock().links.push(ParentLink {
            relationship: relationship.clone(),
            parent: Arc::clone(parent),
        });

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Silent writes (materialization and internal copies)
    // ---------------------------------------------------------------------

    /// Store a value without coercion or change tracking.
    pub fn set_column_silent(&self, column: &str, value: impl Into<Value>) {
        self.inner
            .lock()
            .values
            .insert(column.to_string(), value.into());
    }

    /// Bulk silent set.
    pub fn set_data<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock();
        for (name, value) in values {
            inner.values.insert(name.into(), value);
        }
    }

    // ---------------------------------------------------------------------
    // Write-pipeline hooks
    // ---------------------------------------------------------------------

    /// Fill a column only if it holds no value; never overwrites.
    pub(crate) fn fill_if_absent(&self, column: &str, value: Value) -> bool {
        if value.is_null() {
            return false;
        }
        let mut inner = self.inner.lock();
        let absent = inner.values.get(column).is_none_or(Value::is_null);
        if absent {
            inner.values.insert(column.to_string(), value);
        }
        absent
    }

    /// Undo a fill from a batch that did not commit.
    pub(crate) fn clear_value(&self, column: &str) {
        self.inner.lock().values.remove(column);
    }

    pub(crate) fn parent_links(&self) -> Vec<ParentLink> {
        self.inner.lock().links.clone()
    }

    /// Successful insert or update: back to `Unchanged`, links resolved.
    pub(crate) fn accept_changes(&self) {
        let mut inner = self.inner.lock();
        inner.state = EntityState::Unchanged;
        inner.links.clear();
    }

    /// Successful delete.
    pub(crate) fn mark_deleted(&self) {
        self.inner.lock().state = EntityState::Deleted;
    }

    // ---------------------------------------------------------------------
    // Errors
    // ---------------------------------------------------------------------

    fn invalid_operation(&self, column: &str, state: &EntityState) -> EntityError {
        EntityError::InvalidOperation {
            table: self.table.clone(),
            column: column.to_string(),
            state: state.label(),
        }
    }

    fn coercion(&self, column: &str, source: CoercionError) -> EntityError {
        EntityError::Coercion {
            table: self.table.clone(),
            column: column.to_string(),
            source,
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("state", &inner.state)
            .field("values", &inner.values)
            .finish_non_exhaustive()
    }
}
