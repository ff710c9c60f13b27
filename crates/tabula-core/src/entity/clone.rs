use super::{ChangeTracker, Entity, EntityRef, EntityState};
use crate::value::Value;
use std::{collections::BTreeMap, sync::Arc};

///
/// CloneMode
///
/// Insert drops the primary key and null columns and enters `Created`.
/// Update drops the primary key and marks every copied column changed.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloneMode {
    Insert,
    Update,
}

impl Entity {
    /// Clone into the same owning context.
    #[must_use]
    pub fn clone_as(&self, mode: CloneMode) -> EntityRef {
        let tracker = self.tracker();
        self.clone_to_context(mode, tracker.as_ref())
    }

    /// Clone into another owning context (or none).
    #[must_use]
    pub fn clone_to_context(
        &self,
        mode: CloneMode,
        tracker: Option<&Arc<dyn ChangeTracker>>,
    ) -> EntityRef {
        let values: BTreeMap<String, Value> = self
            .column_values()
            .into_iter()
            .filter(|(name, value)| {
                !self.columns.is_primary_key(name)
                    && (mode == CloneMode::Update || !value.is_null())
            })
            .collect();

        let state = match mode {
            CloneMode::Insert => EntityState::Created,
            CloneMode::Update => EntityState::Modified(values.keys().cloned().collect()),
        };

        let clone = Self::build(
            self.table.clone(),
            Arc::clone(&self.columns),
            values,
            state,
            tracker.map(Arc::downgrade),
        );
        clone.set_on_conflict(self.on_conflict());
        if let Some(tracker) = tracker {
            tracker.track(&clone);
        }

        clone
    }
}
