use std::fmt;

///
/// EntityState
///
/// Lifecycle of one entity record.
///
/// Unchanged → Modified → Delete → Deleted, with Created absorbing every
/// edit until its insert is applied. Reads never move the state.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum EntityState {
    #[default]
    Unchanged,
    Created,
    /// Changed column names in first-edit order, without duplicates.
    Modified(Vec<String>),
    Delete,
    Deleted,
}

impl EntityState {
    /// True while the record has pending, unpersisted changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        matches!(self, Self::Created | Self::Modified(_) | Self::Delete)
    }

    /// In-place edits are rejected once a delete is pending or applied.
    #[must_use]
    pub const fn accepts_edits(&self) -> bool {
        !matches!(self, Self::Delete | Self::Deleted)
    }

    #[must_use]
    pub fn modified_columns(&self) -> &[String] {
        match self {
            Self::Modified(columns) => columns,
            _ => &[],
        }
    }

    /// Record an edit of `column`. Callers check `accepts_edits` first.
    pub(crate) fn record_edit(&mut self, column: &str) {
        match self {
            Self::Unchanged => *self = Self::Modified(vec![column.to_string()]),
            Self::Modified(columns) => {
                if !columns.iter().any(|existing| existing == column) {
                    columns.push(column.to_string());
                }
            }
            Self::Created | Self::Delete | Self::Deleted => {}
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Modified(_) => "modified",
            Self::Delete => "pending delete",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
