//! Tables: record maps plus their indices.

use crate::index::{HashIndex, IndexMismatch, MismatchKind};
use crate::types::RecordId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tabula_codec::{Heap, Key, NodeId, Value};

/// A named collection of records and the indices over them.
///
/// Records are kept in ascending ID order so iteration, scans and
/// snapshots are deterministic. Mutation goes through the
/// [`Store`](crate::Store), which keeps indices consistent.
#[derive(Debug, Clone)]
pub struct Table {
    name: Arc<str>,
    records: BTreeMap<RecordId, NodeId>,
    by_node: HashMap<NodeId, RecordId>,
    last_id: RecordId,
    indices: BTreeMap<String, HashIndex>,
}

impl Table {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            records: BTreeMap::new(),
            by_node: HashMap::new(),
            last_id: RecordId::new(0),
            indices: BTreeMap::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// The highest identifier ever assigned, `rec:0` if none.
    pub fn last_id(&self) -> RecordId {
        self.last_id
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record identifiers and root nodes, in ascending ID order.
    pub fn records(&self) -> impl Iterator<Item = (RecordId, NodeId)> + '_ {
        self.records.iter().map(|(id, node)| (*id, *node))
    }

    /// Root node of a record.
    pub fn node_of(&self, id: RecordId) -> Option<NodeId> {
        self.records.get(&id).copied()
    }

    /// Record whose root is `node`.
    pub fn record_of(&self, node: NodeId) -> Option<RecordId> {
        self.by_node.get(&node).copied()
    }

    /// Indexed column names, sorted.
    pub fn indexed_columns(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    /// The index on `column`, if any.
    pub fn index(&self, column: &str) -> Option<&HashIndex> {
        self.indices.get(column)
    }

    /// Returns true if `column` is indexed.
    pub fn has_index(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    pub(crate) fn set_last_id(&mut self, id: RecordId) {
        self.last_id = self.last_id.max(id);
    }

    /// Inserts a record and indexes every column it defines.
    pub(crate) fn attach(&mut self, id: RecordId, node: NodeId, heap: &Heap) {
        if self.records.contains_key(&id) {
            self.detach(id, heap);
        }
        self.records.insert(id, node);
        self.by_node.insert(node, id);
        self.set_last_id(id);
        for (column, index) in &mut self.indices {
            index.insert(&column_value(heap, node, column), id);
        }
    }

    /// Removes a record and its index memberships.
    pub(crate) fn detach(&mut self, id: RecordId, heap: &Heap) -> Option<NodeId> {
        let node = self.records.remove(&id)?;
        self.by_node.remove(&node);
        for (column, index) in &mut self.indices {
            index.remove(&column_value(heap, node, column), id);
        }
        Some(node)
    }

    /// Moves a record between buckets after its `column` changed.
    pub(crate) fn reindex(
        &mut self,
        id: RecordId,
        column: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        let Some(index) = self.indices.get_mut(column) else {
            return;
        };
        if let Some(old) = old {
            index.remove(old, id);
        }
        if let Some(new) = new {
            index.insert(new, id);
        }
    }

    /// Builds an index on `column` from a scan. Returns false if one exists.
    pub(crate) fn add_index(&mut self, column: &str, heap: &Heap) -> bool {
        if self.indices.contains_key(column) {
            return false;
        }
        let mut index = HashIndex::new(column);
        index.rebuild(
            self.records
                .iter()
                .map(|(id, node)| (column_value(heap, *node, column), *id)),
        );
        self.indices.insert(column.to_string(), index);
        true
    }

    pub(crate) fn remove_index(&mut self, column: &str) -> bool {
        self.indices.remove(column).is_some()
    }

    pub(crate) fn rebuild_index(&mut self, column: &str, heap: &Heap) -> bool {
        let Some(index) = self.indices.get_mut(column) else {
            return false;
        };
        index.rebuild(
            self.records
                .iter()
                .map(|(id, node)| (column_value(heap, *node, column), *id)),
        );
        true
    }

    pub(crate) fn install_index(&mut self, index: HashIndex) {
        self.indices.insert(index.column().to_string(), index);
    }

    /// Records whose `column` equals `value`, by index when present.
    pub(crate) fn lookup(&self, heap: &Heap, column: &str, value: &Value) -> Vec<RecordId> {
        match self.indices.get(column) {
            Some(index) => index.lookup(value),
            None => self.scan(heap, column, value),
        }
    }

    /// Records whose `column` equals `value`, by full scan.
    pub(crate) fn scan(&self, heap: &Heap, column: &str, value: &Value) -> Vec<RecordId> {
        if value.is_undefined() {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|(_, node)| column_value(heap, **node, column) == *value)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Compares every index against the records.
    pub(crate) fn verify(&self, heap: &Heap) -> Vec<IndexMismatch> {
        let mut mismatches = Vec::new();
        for (column, index) in &self.indices {
            let mismatch = |record, kind| IndexMismatch {
                table: self.name.to_string(),
                column: column.clone(),
                record,
                kind,
            };
            for (id, node) in &self.records {
                let value = column_value(heap, *node, column);
                if !value.is_undefined() && !index.lookup(&value).contains(id) {
                    mismatches.push(mismatch(*id, MismatchKind::Missing { value }));
                }
            }
            for (value, members) in index.buckets() {
                for id in members {
                    let holds = self
                        .records
                        .get(id)
                        .is_some_and(|node| column_value(heap, *node, column) == *value);
                    if !holds {
                        mismatches.push(mismatch(
                            *id,
                            MismatchKind::Stale {
                                value: value.clone(),
                            },
                        ));
                    }
                }
            }
        }
        mismatches
    }
}

/// A record's value at `column`, `undefined` if it has none.
pub(crate) fn column_value(heap: &Heap, node: NodeId, column: &str) -> Value {
    heap.node(node)
        .and_then(|n| n.field(&Key::Name(column.to_string())))
        .cloned()
        .unwrap_or(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(heap: &mut Heap, name: &str, email: &str) -> NodeId {
        let value = heap.object([("name", Value::from(name)), ("email", Value::from(email))]);
        value.as_node().unwrap()
    }

    #[test]
    fn attach_indexes_existing_columns() {
        let mut heap = Heap::new();
        let mut table = Table::new("users");
        table.add_index("email", &heap);

        let john = user(&mut heap, "John", "j@x.com");
        table.attach(RecordId::new(1), john, &heap);

        assert_eq!(table.len(), 1);
        assert_eq!(table.last_id(), RecordId::new(1));
        assert_eq!(table.record_of(john), Some(RecordId::new(1)));
        assert_eq!(
            table.lookup(&heap, "email", &Value::from("j@x.com")),
            vec![RecordId::new(1)]
        );
    }

    #[test]
    fn detach_clears_memberships() {
        let mut heap = Heap::new();
        let mut table = Table::new("users");
        table.add_index("email", &heap);
        let john = user(&mut heap, "John", "j@x.com");
        table.attach(RecordId::new(1), john, &heap);

        assert_eq!(table.detach(RecordId::new(1), &heap), Some(john));
        assert!(table.index("email").unwrap().is_empty());
        assert_eq!(table.last_id(), RecordId::new(1));
        assert_eq!(table.detach(RecordId::new(1), &heap), None);
    }

    #[test]
    fn add_index_scans_records() {
        let mut heap = Heap::new();
        let mut table = Table::new("users");
        let a = user(&mut heap, "A", "same");
        let b = user(&mut heap, "B", "same");
        table.attach(RecordId::new(1), a, &heap);
        table.attach(RecordId::new(2), b, &heap);

        assert!(table.add_index("email", &heap));
        assert!(!table.add_index("email", &heap));
        assert_eq!(
            table.lookup(&heap, "email", &Value::from("same")),
            vec![RecordId::new(1), RecordId::new(2)]
        );
    }

    #[test]
    fn scan_skips_missing_columns() {
        let mut heap = Heap::new();
        let mut table = Table::new("t");
        let bare = heap.object([("x", Value::from(1))]).as_node().unwrap();
        table.attach(RecordId::new(1), bare, &heap);

        assert!(table.scan(&heap, "y", &Value::Undefined).is_empty());
        assert_eq!(table.scan(&heap, "x", &Value::from(1)), vec![RecordId::new(1)]);
    }

    #[test]
    fn verify_reports_stale_and_missing() {
        let mut heap = Heap::new();
        let mut table = Table::new("users");
        table.add_index("email", &heap);
        let john = user(&mut heap, "John", "old");
        table.attach(RecordId::new(1), john, &heap);
        assert!(table.verify(&heap).is_empty());

        heap.set_field(john, "email", Value::from("new"));
        let mismatches = table.verify(&heap);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches
            .iter()
            .any(|m| m.kind == MismatchKind::Missing { value: Value::from("new") }));
        assert!(mismatches
            .iter()
            .any(|m| m.kind == MismatchKind::Stale { value: Value::from("old") }));

        assert!(table.rebuild_index("email", &heap));
        assert!(table.verify(&heap).is_empty());
    }
}
