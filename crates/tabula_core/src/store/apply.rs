//! Applying change events to the heap, tables and indices.
//!
//! Every mutation, forward or undo, goes through [`Store::apply`], so index
//! maintenance lives in one place.

use super::Store;
use crate::change::{ChangeEvent, ChangeKind};
use crate::error::{StoreError, StoreResult};
use tabula_codec::{Key, Node, NodeId, Value};

impl Store {
    pub(crate) fn apply(&mut self, event: &ChangeEvent) -> StoreResult<()> {
        match &event.kind {
            ChangeKind::RecordAdded => {
                if self.heap.node(event.target).is_none() {
                    return Err(StoreError::UnknownNode { node: event.target });
                }
                let table = self
                    .tables
                    .get_mut(&*event.table)
                    .ok_or_else(|| StoreError::table_not_found(&*event.table))?;
                table.attach(event.record, event.target, &self.heap);
            }
            ChangeKind::RecordRemoved => {
                let table = self
                    .tables
                    .get_mut(&*event.table)
                    .ok_or_else(|| StoreError::table_not_found(&*event.table))?;
                table
                    .detach(event.record, &self.heap)
                    .ok_or_else(|| StoreError::RecordNotFound {
                        table: event.table.to_string(),
                        id: event.record,
                    })?;
                self.handles.evict_record(&event.table, event.record);
            }

            ChangeKind::FieldSet {
                key, new, index, ..
            } => {
                let fields = self.object_mut(event.target)?;
                let prior = match fields.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => Some(std::mem::replace(&mut slot.1, new.clone())),
                    None => {
                        let at = (*index).min(fields.len());
                        fields.insert(at, (key.clone(), new.clone()));
                        None
                    }
                };
                self.reindex(event, key, prior.as_ref(), Some(new));
            }
            ChangeKind::FieldDeleted { key, .. } => {
                let fields = self.object_mut(event.target)?;
                let prior = fields
                    .iter()
                    .position(|(k, _)| k == key)
                    .map(|i| fields.remove(i).1);
                self.reindex(event, key, prior.as_ref(), None);
            }

            ChangeKind::MapSet {
                key, new, index, ..
            } => {
                let entries = self.map_mut(event.target)?;
                match entries.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = new.clone(),
                    None => {
                        let at = (*index).min(entries.len());
                        entries.insert(at, (key.clone(), new.clone()));
                    }
                }
            }
            ChangeKind::MapDeleted { key, .. } => {
                let entries = self.map_mut(event.target)?;
                entries.retain(|(k, _)| k != key);
            }
            ChangeKind::MapCleared { .. } => self.map_mut(event.target)?.clear(),
            ChangeKind::MapRestored { entries } => *self.map_mut(event.target)? = entries.clone(),

            ChangeKind::SetAdded { value, index } => {
                let items = self.set_mut(event.target)?;
                if !items.contains(value) {
                    let at = (*index).min(items.len());
                    items.insert(at, value.clone());
                }
            }
            ChangeKind::SetDeleted { value, .. } => {
                self.set_mut(event.target)?.retain(|v| v != value);
            }
            ChangeKind::SetCleared { .. } => self.set_mut(event.target)?.clear(),
            ChangeKind::SetRestored { values } => *self.set_mut(event.target)? = values.clone(),

            ChangeKind::ListSet { index, new, .. } => {
                let items = self.list_mut(event.target)?;
                let len = items.len();
                let slot = items
                    .get_mut(*index)
                    .ok_or(StoreError::IndexOutOfBounds { index: *index, len })?;
                *slot = new.clone();
            }
            ChangeKind::ListPushed { value } => self.list_mut(event.target)?.push(value.clone()),
            ChangeKind::ListUnshifted { value } => {
                self.list_mut(event.target)?.insert(0, value.clone());
            }
            ChangeKind::ListPopped { .. } => {
                let items = self.list_mut(event.target)?;
                if items.pop().is_none() {
                    return Err(StoreError::IndexOutOfBounds { index: 0, len: 0 });
                }
            }
            ChangeKind::ListShifted { .. } => {
                let items = self.list_mut(event.target)?;
                if items.is_empty() {
                    return Err(StoreError::IndexOutOfBounds { index: 0, len: 0 });
                }
                items.remove(0);
            }
            ChangeKind::ListSpliced {
                start,
                removed,
                inserted,
            } => {
                let items = self.list_mut(event.target)?;
                let end = start + removed.len();
                if end > items.len() {
                    return Err(StoreError::IndexOutOfBounds {
                        index: end,
                        len: items.len(),
                    });
                }
                items.splice(*start..end, inserted.iter().cloned());
            }
        }
        Ok(())
    }

    /// Moves the record between buckets when a root field of an indexed
    /// column changed.
    ///
    /// The owner is resolved from the target node, not from the event's
    /// attribution, since a record root reached through another record is
    /// still that record's root.
    fn reindex(&mut self, event: &ChangeEvent, key: &Key, prior: Option<&Value>, new: Option<&Value>) {
        let Some(column) = key.as_name() else {
            return;
        };
        for table in self.tables.values_mut() {
            if let Some(record) = table.record_of(event.target) {
                table.reindex(record, column, prior, new);
                return;
            }
        }
    }

    fn node_mut(&mut self, node: NodeId) -> StoreResult<&mut Node> {
        self.heap
            .node_mut(node)
            .ok_or(StoreError::UnknownNode { node })
    }

    fn object_mut(&mut self, node: NodeId) -> StoreResult<&mut Vec<(Key, Value)>> {
        match self.node_mut(node)? {
            Node::Object(fields) => Ok(fields),
            other => Err(StoreError::invalid_target("object", other.kind())),
        }
    }

    fn map_mut(&mut self, node: NodeId) -> StoreResult<&mut Vec<(Value, Value)>> {
        match self.node_mut(node)? {
            Node::Map(entries) => Ok(entries),
            other => Err(StoreError::invalid_target("map", other.kind())),
        }
    }

    fn set_mut(&mut self, node: NodeId) -> StoreResult<&mut Vec<Value>> {
        match self.node_mut(node)? {
            Node::Set(items) => Ok(items),
            other => Err(StoreError::invalid_target("set", other.kind())),
        }
    }

    fn list_mut(&mut self, node: NodeId) -> StoreResult<&mut Vec<Value>> {
        match self.node_mut(node)? {
            Node::List(items) => Ok(items),
            other => Err(StoreError::invalid_target("list", other.kind())),
        }
    }
}
