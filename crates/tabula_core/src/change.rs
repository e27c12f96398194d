//! Change events.
//!
//! Every mutation of stored data is described by a [`ChangeEvent`] that
//! carries the prior values needed to undo it. [`ChangeKind::inverse`]
//! produces the event that, applied forward, restores the previous state;
//! rollback is nothing more than applying inverses newest-first.

use crate::types::RecordId;
use std::sync::Arc;
use tabula_codec::{Key, NodeId, Value};

/// One observed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Table the mutated record belongs to.
    pub table: Arc<str>,
    /// Record the mutation is attributed to.
    pub record: RecordId,
    /// Top-level column the mutation is attributed to, if any.
    pub column: Option<Arc<str>>,
    /// Node that was mutated (the record root for record events).
    pub target: NodeId,
    /// What happened.
    pub kind: ChangeKind,
}

/// The shape of a mutation, with the payload needed to invert it.
///
/// Positions (`index`) are where the affected key or element sits when it
/// is present, so an inverse re-inserts at the same place.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// A record was inserted into its table.
    RecordAdded,
    /// A record was removed from its table.
    RecordRemoved,

    /// Object field assignment. `old` is `None` when the field was absent.
    FieldSet {
        /// Field name.
        key: Key,
        /// Prior value.
        old: Option<Value>,
        /// New value.
        new: Value,
        /// Field position.
        index: usize,
    },
    /// Object field deletion.
    FieldDeleted {
        /// Field name.
        key: Key,
        /// Removed value.
        old: Value,
        /// Position the field occupied.
        index: usize,
    },

    /// Map insert or overwrite. `old` is `None` when the key was new.
    MapSet {
        /// Entry key.
        key: Value,
        /// Prior value.
        old: Option<Value>,
        /// New value.
        new: Value,
        /// Entry position.
        index: usize,
    },
    /// Map entry removal.
    MapDeleted {
        /// Entry key.
        key: Value,
        /// Removed value.
        old: Value,
        /// Position the entry occupied.
        index: usize,
    },
    /// Map emptied; carries the full prior contents.
    MapCleared {
        /// Entries before the clear.
        entries: Vec<(Value, Value)>,
    },
    /// Map refilled after a clear was rolled back.
    MapRestored {
        /// Entries put back.
        entries: Vec<(Value, Value)>,
    },

    /// Set insert of a new element.
    SetAdded {
        /// The element.
        value: Value,
        /// Element position.
        index: usize,
    },
    /// Set element removal.
    SetDeleted {
        /// The element.
        value: Value,
        /// Position the element occupied.
        index: usize,
    },
    /// Set emptied; carries the full prior contents.
    SetCleared {
        /// Elements before the clear.
        values: Vec<Value>,
    },
    /// Set refilled after a clear was rolled back.
    SetRestored {
        /// Elements put back.
        values: Vec<Value>,
    },

    /// List element assignment.
    ListSet {
        /// Position.
        index: usize,
        /// Prior element.
        old: Value,
        /// New element.
        new: Value,
    },
    /// Append.
    ListPushed {
        /// Appended element.
        value: Value,
    },
    /// Prepend.
    ListUnshifted {
        /// Prepended element.
        value: Value,
    },
    /// Remove last.
    ListPopped {
        /// Removed element.
        value: Value,
    },
    /// Remove first.
    ListShifted {
        /// Removed element.
        value: Value,
    },
    /// Replace `removed` at `start` with `inserted`.
    ListSpliced {
        /// Start position.
        start: usize,
        /// Elements taken out.
        removed: Vec<Value>,
        /// Elements put in.
        inserted: Vec<Value>,
    },
}

impl ChangeKind {
    /// Returns the event that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> ChangeKind {
        match self.clone() {
            ChangeKind::RecordAdded => ChangeKind::RecordRemoved,
            ChangeKind::RecordRemoved => ChangeKind::RecordAdded,
            ChangeKind::FieldSet {
                key,
                old: Some(old),
                new,
                index,
            } => ChangeKind::FieldSet {
                key,
                old: Some(new),
                new: old,
                index,
            },
            ChangeKind::FieldSet {
                key,
                old: None,
                new,
                index,
            } => ChangeKind::FieldDeleted {
                key,
                old: new,
                index,
            },
            ChangeKind::FieldDeleted { key, old, index } => ChangeKind::FieldSet {
                key,
                old: None,
                new: old,
                index,
            },
            ChangeKind::MapSet {
                key,
                old: Some(old),
                new,
                index,
            } => ChangeKind::MapSet {
                key,
                old: Some(new),
                new: old,
                index,
            },
            ChangeKind::MapSet {
                key,
                old: None,
                new,
                index,
            } => ChangeKind::MapDeleted {
                key,
                old: new,
                index,
            },
            ChangeKind::MapDeleted { key, old, index } => ChangeKind::MapSet {
                key,
                old: None,
                new: old,
                index,
            },
            ChangeKind::MapCleared { entries } => ChangeKind::MapRestored { entries },
            ChangeKind::MapRestored { entries } => ChangeKind::MapCleared { entries },
            ChangeKind::SetAdded { value, index } => ChangeKind::SetDeleted { value, index },
            ChangeKind::SetDeleted { value, index } => ChangeKind::SetAdded { value, index },
            ChangeKind::SetCleared { values } => ChangeKind::SetRestored { values },
            ChangeKind::SetRestored { values } => ChangeKind::SetCleared { values },
            ChangeKind::ListSet { index, old, new } => ChangeKind::ListSet {
                index,
                old: new,
                new: old,
            },
            ChangeKind::ListPushed { value } => ChangeKind::ListPopped { value },
            ChangeKind::ListPopped { value } => ChangeKind::ListPushed { value },
            ChangeKind::ListUnshifted { value } => ChangeKind::ListShifted { value },
            ChangeKind::ListShifted { value } => ChangeKind::ListUnshifted { value },
            ChangeKind::ListSpliced {
                start,
                removed,
                inserted,
            } => ChangeKind::ListSpliced {
                start,
                removed: inserted,
                inserted: removed,
            },
        }
    }

    /// Short name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::RecordAdded => "record-added",
            ChangeKind::RecordRemoved => "record-removed",
            ChangeKind::FieldSet { .. } => "field-set",
            ChangeKind::FieldDeleted { .. } => "field-deleted",
            ChangeKind::MapSet { .. } => "map-set",
            ChangeKind::MapDeleted { .. } => "map-deleted",
            ChangeKind::MapCleared { .. } => "map-cleared",
            ChangeKind::MapRestored { .. } => "map-restored",
            ChangeKind::SetAdded { .. } => "set-added",
            ChangeKind::SetDeleted { .. } => "set-deleted",
            ChangeKind::SetCleared { .. } => "set-cleared",
            ChangeKind::SetRestored { .. } => "set-restored",
            ChangeKind::ListSet { .. } => "list-set",
            ChangeKind::ListPushed { .. } => "list-pushed",
            ChangeKind::ListUnshifted { .. } => "list-unshifted",
            ChangeKind::ListPopped { .. } => "list-popped",
            ChangeKind::ListShifted { .. } => "list-shifted",
            ChangeKind::ListSpliced { .. } => "list-spliced",
        }
    }
}

impl ChangeEvent {
    /// Returns the event that undoes this one, with the same attribution.
    #[must_use]
    pub fn inverse(&self) -> ChangeEvent {
        ChangeEvent {
            table: Arc::clone(&self.table),
            record: self.record,
            column: self.column.clone(),
            target: self.target,
            kind: self.kind.inverse(),
        }
    }
}

/// Type of table-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableChangeType {
    /// Table was created.
    TableCreated,
    /// Table was deleted.
    TableDeleted,
    /// Index was added.
    IndexAdded,
    /// Index was removed.
    IndexRemoved,
}

/// A table or index lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEvent {
    /// Type of change.
    pub change_type: TableChangeType,
    /// Table affected.
    pub table: String,
    /// Column affected, for index events.
    pub column: Option<String>,
}

impl TableEvent {
    pub(crate) fn table(change_type: TableChangeType, table: &str) -> Self {
        Self {
            change_type,
            table: table.to_string(),
            column: None,
        }
    }

    pub(crate) fn index(change_type: TableChangeType, table: &str, column: &str) -> Self {
        Self {
            change_type,
            table: table.to_string(),
            column: Some(column.to_string()),
        }
    }
}
