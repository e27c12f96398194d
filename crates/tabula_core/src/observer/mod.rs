//! Mutation observer.
//!
//! Stored values are never handed out by mutable reference. Callers hold
//! [`Handle`]s and go through an [`Observer`] for every read and write:
//!
//! - reads return scalars as-is and composites as handles, attributed to
//!   the record and top-level column they were reached through
//! - writes are turned into a [`ChangeEvent`](crate::ChangeEvent) that the
//!   store applies, reflects into indices, logs and dispatches in one step
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{Observed, Store};
//! use tabula_codec::Value;
//!
//! let mut store = Store::new();
//! store.create_table("users", &["email"]);
//!
//! let hobbies = store.heap_mut().list([Value::from("a"), Value::from("b")]);
//! let john = store.heap_mut().object([("email", Value::from("j@x.com")), ("hobbies", hobbies)]);
//! let john = store.add_record("users", john).unwrap();
//!
//! let hobbies = store.observe(&john).get("hobbies").unwrap().unwrap().into_handle().unwrap();
//! assert_eq!(hobbies.column(), Some("hobbies"));
//!
//! store.observe(&hobbies).push("c").unwrap();
//! assert_eq!(store.observe(&hobbies).len().unwrap(), 3);
//!
//! store.observe(&john).set("email", "john@x.com").unwrap();
//! let found = store.get_records_by_column("users", "email", &Value::from("john@x.com")).unwrap();
//! assert_eq!(found, vec![john]);
//! ```

mod handle;

pub use handle::{Attribution, Handle, Observed, RecordHandle};
pub(crate) use handle::HandleCache;

use crate::change::{ChangeEvent, ChangeKind};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use std::sync::Arc;
use tabula_codec::{Key, Node, NodeKind, Symbol, Value};

/// Read and write access to one stored composite.
///
/// Obtained from [`Store::observe`]. The observer borrows the store
/// mutably for its lifetime; handles returned from reads outlive it.
pub struct Observer<'s> {
    store: &'s mut Store,
    handle: Handle,
}

impl<'s> Observer<'s> {
    pub(crate) fn new(store: &'s mut Store, handle: Handle) -> Self {
        Self { store, handle }
    }

    /// The observed handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The raw value behind the handle.
    pub fn value(&self) -> Value {
        self.handle.value()
    }

    fn node(&self) -> StoreResult<&Node> {
        let id = self.handle.node();
        self.store
            .heap()
            .node(id)
            .ok_or_else(|| StoreError::UnknownNode { node: id }.reported())
    }

    /// Kind of the observed composite.
    pub fn kind(&self) -> StoreResult<NodeKind> {
        Ok(self.node()?.kind())
    }

    /// Number of elements, entries or fields.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.node()?.len())
    }

    /// Returns true if the composite has no elements.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.node()?.is_empty())
    }

    /// Milliseconds since the epoch, for a date.
    pub fn date(&self) -> StoreResult<f64> {
        match self.node()? {
            Node::Date(ms) => Ok(*ms),
            other => Err(mismatch("date", other)),
        }
    }

    fn wrap(&mut self, value: Value, field: Option<&str>) -> Observed {
        self.store.wrap_child(&self.handle, field, value)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Reads an object field.
    pub fn get(&mut self, key: impl Into<Key>) -> StoreResult<Option<Observed>> {
        let key = key.into();
        let value = match self.node()? {
            Node::Object(fields) => fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()),
            other => return Err(mismatch("object", other)),
        };
        Ok(value.map(|v| self.wrap(v, key.as_name())))
    }

    /// Reads a list element.
    pub fn at(&mut self, index: usize) -> StoreResult<Option<Observed>> {
        let value = match self.node()? {
            Node::List(items) => items.get(index).cloned(),
            other => return Err(mismatch("list", other)),
        };
        Ok(value.map(|v| self.wrap(v, None)))
    }

    /// Reads a map entry.
    pub fn get_entry(&mut self, key: &Value) -> StoreResult<Option<Observed>> {
        let value = match self.node()? {
            node @ Node::Map(_) => node.entry(key).cloned(),
            other => return Err(mismatch("map", other)),
        };
        Ok(value.map(|v| self.wrap(v, None)))
    }

    /// Membership test: set elements, map keys, or object field names
    /// (given as text or symbol).
    pub fn has(&self, key: &Value) -> StoreResult<bool> {
        match self.node()? {
            Node::Set(items) => Ok(items.contains(key)),
            Node::Map(entries) => Ok(entries.iter().any(|(k, _)| k == key)),
            Node::Object(fields) => Ok(match value_to_key(key) {
                Some(key) => fields.iter().any(|(k, _)| *k == key),
                None => false,
            }),
            other => Err(mismatch("set, map or object", other)),
        }
    }

    /// Keys in iteration order: field names for objects, positions for
    /// lists, keys for maps and elements for sets.
    pub fn keys(&mut self) -> StoreResult<Vec<Observed>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    /// Values in iteration order.
    pub fn iter(&mut self) -> StoreResult<std::vec::IntoIter<Observed>> {
        let items: Vec<Observed> = self.entries()?.into_iter().map(|(_, v)| v).collect();
        Ok(items.into_iter())
    }

    /// Key/value pairs in iteration order. Composite keys and values are
    /// wrapped.
    pub fn entries(&mut self) -> StoreResult<Vec<(Observed, Observed)>> {
        let raw: Vec<(Value, Value, Option<String>)> = match self.node()? {
            Node::Object(fields) => fields
                .iter()
                .map(|(k, v)| (key_to_value(k), v.clone(), k.as_name().map(str::to_string)))
                .collect(),
            Node::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone(), None))
                .collect(),
            Node::Map(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone(), None))
                .collect(),
            Node::Set(items) => items
                .iter()
                .map(|v| (v.clone(), v.clone(), None))
                .collect(),
            other => return Err(mismatch("container", other)),
        };
        Ok(raw
            .into_iter()
            .map(|(k, v, field)| {
                let key = self.wrap(k, None);
                let value = self.wrap(v, field.as_deref());
                (key, value)
            })
            .collect())
    }

    /// Calls `f` with each key and value. The store is available to the
    /// callback so items can be observed and mutated mid-iteration; the
    /// entries are taken before the first call.
    pub fn for_each<F>(&mut self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&mut Store, Observed, Observed) -> StoreResult<()>,
    {
        for (key, item) in self.entries()? {
            f(&mut *self.store, key, item)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    fn prepare_write(&self, values: &[&Value]) -> StoreResult<()> {
        self.store.ensure_live(&self.handle)?;
        for value in values {
            self.store.ensure_value(value)?;
        }
        Ok(())
    }

    fn submit(&mut self, column: Option<Arc<str>>, kind: ChangeKind) -> StoreResult<()> {
        let origin = self.handle.origin();
        let event = ChangeEvent {
            table: Arc::clone(&origin.table),
            record: origin.record,
            column,
            target: self.handle.node(),
            kind,
        };
        self.store.submit(event)
    }

    fn inherited_column(&self) -> Option<Arc<str>> {
        self.handle.origin().column.clone()
    }

    fn field_column(&self, key: &Key) -> Option<Arc<str>> {
        if self.store.is_root(&self.handle) {
            key.as_name().map(Arc::from)
        } else {
            self.inherited_column()
        }
    }

    /// Assigns an object field.
    ///
    /// # Errors
    ///
    /// `ReservedKey` for the record identifier field, `InvalidMutationTarget`
    /// if the value is not an object, `RecordNotFound` if the owning record
    /// was removed.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> StoreResult<()> {
        let key = key.into();
        let new = value.into();
        guard_key(&key)?;
        self.prepare_write(&[&new])?;
        let (old, index) = match self.node()? {
            Node::Object(fields) => match fields.iter().position(|(k, _)| *k == key) {
                Some(i) => (Some(fields[i].1.clone()), i),
                None => (None, fields.len()),
            },
            other => return Err(mismatch("object", other)),
        };
        let column = self.field_column(&key);
        self.submit(
            column,
            ChangeKind::FieldSet {
                key,
                old,
                new,
                index,
            },
        )
    }

    /// Deletes an object field, returning its value. Deleting a missing
    /// field changes nothing and emits no event.
    pub fn delete(&mut self, key: impl Into<Key>) -> StoreResult<Option<Observed>> {
        let key = key.into();
        guard_key(&key)?;
        self.prepare_write(&[])?;
        let found = match self.node()? {
            Node::Object(fields) => fields
                .iter()
                .position(|(k, _)| *k == key)
                .map(|i| (i, fields[i].1.clone())),
            other => return Err(mismatch("object", other)),
        };
        let Some((index, old)) = found else {
            return Ok(None);
        };
        let column = self.field_column(&key);
        self.submit(
            column,
            ChangeKind::FieldDeleted {
                key: key.clone(),
                old: old.clone(),
                index,
            },
        )?;
        Ok(Some(self.wrap(old, key.as_name())))
    }

    fn list_len(&self) -> StoreResult<usize> {
        match self.node()? {
            Node::List(items) => Ok(items.len()),
            other => Err(mismatch("list", other)),
        }
    }

    /// Replaces a list element.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index` is not an existing position.
    pub fn set_at(&mut self, index: usize, value: impl Into<Value>) -> StoreResult<()> {
        let new = value.into();
        self.prepare_write(&[&new])?;
        let old = match self.node()? {
            Node::List(items) => items.get(index).cloned().ok_or_else(|| {
                StoreError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }
                .reported()
            })?,
            other => return Err(mismatch("list", other)),
        };
        let column = self.inherited_column();
        self.submit(column, ChangeKind::ListSet { index, old, new })
    }

    /// Appends to a list. Returns the new length.
    pub fn push(&mut self, value: impl Into<Value>) -> StoreResult<usize> {
        let value = value.into();
        self.prepare_write(&[&value])?;
        let len = self.list_len()?;
        let column = self.inherited_column();
        self.submit(column, ChangeKind::ListPushed { value })?;
        Ok(len + 1)
    }

    /// Prepends to a list. Returns the new length.
    pub fn unshift(&mut self, value: impl Into<Value>) -> StoreResult<usize> {
        let value = value.into();
        self.prepare_write(&[&value])?;
        let len = self.list_len()?;
        let column = self.inherited_column();
        self.submit(column, ChangeKind::ListUnshifted { value })?;
        Ok(len + 1)
    }

    /// Removes the last list element.
    pub fn pop(&mut self) -> StoreResult<Option<Observed>> {
        self.prepare_write(&[])?;
        let last = match self.node()? {
            Node::List(items) => items.last().cloned(),
            other => return Err(mismatch("list", other)),
        };
        let Some(value) = last else {
            return Ok(None);
        };
        let column = self.inherited_column();
        self.submit(
            column,
            ChangeKind::ListPopped {
                value: value.clone(),
            },
        )?;
        Ok(Some(self.wrap(value, None)))
    }

    /// Removes the first list element.
    pub fn shift(&mut self) -> StoreResult<Option<Observed>> {
        self.prepare_write(&[])?;
        let first = match self.node()? {
            Node::List(items) => items.first().cloned(),
            other => return Err(mismatch("list", other)),
        };
        let Some(value) = first else {
            return Ok(None);
        };
        let column = self.inherited_column();
        self.submit(
            column,
            ChangeKind::ListShifted {
                value: value.clone(),
            },
        )?;
        Ok(Some(self.wrap(value, None)))
    }

    /// Removes `delete_count` elements at `start` and inserts `items` in
    /// their place. `start` and `delete_count` are clamped to the list.
    /// Returns the removed elements.
    pub fn splice<I>(&mut self, start: usize, delete_count: usize, items: I) -> StoreResult<Vec<Observed>>
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = items.into_iter().collect();
        let refs: Vec<&Value> = inserted.iter().collect();
        self.prepare_write(&refs)?;
        let (start, removed) = match self.node()? {
            Node::List(current) => {
                let start = start.min(current.len());
                let end = start + delete_count.min(current.len() - start);
                (start, current[start..end].to_vec())
            }
            other => return Err(mismatch("list", other)),
        };
        if removed.is_empty() && inserted.is_empty() {
            return Ok(Vec::new());
        }
        let column = self.inherited_column();
        self.submit(
            column,
            ChangeKind::ListSpliced {
                start,
                removed: removed.clone(),
                inserted,
            },
        )?;
        Ok(removed.into_iter().map(|v| self.wrap(v, None)).collect())
    }

    /// Inserts or overwrites a map entry.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> StoreResult<()> {
        let key = key.into();
        let new = value.into();
        self.prepare_write(&[&key, &new])?;
        let (old, index) = match self.node()? {
            Node::Map(entries) => match entries.iter().position(|(k, _)| *k == key) {
                Some(i) => (Some(entries[i].1.clone()), i),
                None => (None, entries.len()),
            },
            other => return Err(mismatch("map", other)),
        };
        let column = self.inherited_column();
        self.submit(
            column,
            ChangeKind::MapSet {
                key,
                old,
                new,
                index,
            },
        )
    }

    /// Adds a set element. Returns false if it was already present.
    pub fn add(&mut self, value: impl Into<Value>) -> StoreResult<bool> {
        let value = value.into();
        self.prepare_write(&[&value])?;
        let index = match self.node()? {
            Node::Set(items) if items.contains(&value) => return Ok(false),
            Node::Set(items) => items.len(),
            other => return Err(mismatch("set", other)),
        };
        let column = self.inherited_column();
        self.submit(column, ChangeKind::SetAdded { value, index })?;
        Ok(true)
    }

    /// Removes a map entry or set element. Returns false if absent.
    pub fn remove(&mut self, key: &Value) -> StoreResult<bool> {
        self.prepare_write(&[])?;
        let kind = match self.node()? {
            Node::Map(entries) => entries
                .iter()
                .position(|(k, _)| k == key)
                .map(|index| ChangeKind::MapDeleted {
                    key: entries[index].0.clone(),
                    old: entries[index].1.clone(),
                    index,
                }),
            Node::Set(items) => items
                .iter()
                .position(|v| v == key)
                .map(|index| ChangeKind::SetDeleted {
                    value: items[index].clone(),
                    index,
                }),
            other => return Err(mismatch("map or set", other)),
        };
        let Some(kind) = kind else {
            return Ok(false);
        };
        let column = self.inherited_column();
        self.submit(column, kind)?;
        Ok(true)
    }

    /// Empties a map or set. Clearing an empty container emits no event.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.prepare_write(&[])?;
        let kind = match self.node()? {
            Node::Map(entries) if entries.is_empty() => return Ok(()),
            Node::Set(items) if items.is_empty() => return Ok(()),
            Node::Map(entries) => ChangeKind::MapCleared {
                entries: entries.clone(),
            },
            Node::Set(items) => ChangeKind::SetCleared {
                values: items.clone(),
            },
            other => return Err(mismatch("map or set", other)),
        };
        let column = self.inherited_column();
        self.submit(column, kind)
    }
}

fn mismatch(expected: &'static str, found: &Node) -> StoreError {
    StoreError::invalid_target(expected, found.kind()).reported()
}

fn guard_key(key: &Key) -> StoreResult<()> {
    match key {
        Key::Symbol(symbol) if *symbol == Symbol::record_id() => Err(StoreError::ReservedKey {
            key: key.to_string(),
        }
        .reported()),
        _ => Ok(()),
    }
}

fn key_to_value(key: &Key) -> Value {
    match key {
        Key::Name(name) => Value::Text(name.clone()),
        Key::Symbol(symbol) => Value::Symbol(symbol.clone()),
    }
}

fn value_to_key(value: &Value) -> Option<Key> {
    match value {
        Value::Text(name) => Some(Key::Name(name.clone())),
        Value::Symbol(symbol) => Some(Key::Symbol(symbol.clone())),
        _ => None,
    }
}
