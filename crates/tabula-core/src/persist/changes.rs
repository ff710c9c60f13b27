use crate::{
    entity::{ChangeTracker, EntityId, EntityRef},
    model::Table,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

///
/// PendingEntry
///

struct PendingEntry {
    entity: EntityRef,
    touched: DateTime<Utc>,
}

///
/// PendingChanges
///
/// The dirty set: entities awaiting submission keyed by identity, each
/// stamped with the time it was last marked. Safe to mark from many threads.
///

#[derive(Default)]
pub struct PendingChanges {
    entries: Mutex<HashMap<EntityId, PendingEntry>>,
}

impl PendingChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, entity: &EntityRef) {
        self.entries.lock().insert(
            entity.id(),
            PendingEntry {
                entity: Arc::clone(entity),
                touched: Utc::now(),
            },
        );
    }

    pub fn remove(&self, id: EntityId) -> Option<EntityRef> {
        self.entries.lock().remove(&id).map(|entry| entry.entity)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    #[must_use]
    pub fn last_modified(&self, id: EntityId) -> Option<DateTime<Utc>> {
        self.entries.lock().get(&id).map(|entry| entry.touched)
    }

    /// Dirty entities in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntityRef> {
        let mut out: Vec<_> = self
            .entries
            .lock()
            .values()
            .filter(|entry| entry.entity.state().is_dirty())
            .map(|entry| Arc::clone(&entry.entity))
            .collect();
        out.sort_by_key(|entity| entity.id());
        out
    }

    /// Distinct tables touched by the dirty set.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        let mut tables: Vec<Table> = self
            .entries
            .lock()
            .values()
            .map(|entry| entry.entity.table().clone())
            .collect();
        tables.sort_by(|a, b| a.full_name().cmp(b.full_name()));
        tables.dedup();
        tables
    }

    /// Discard everything without touching the rows. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ChangeTracker for PendingChanges {
    fn track(&self, entity: &EntityRef) {
        self.mark(entity);
    }

    fn forget(&self, id: EntityId) {
        self.remove(id);
    }
}
