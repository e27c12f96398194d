//! The record store.

mod apply;
mod snapshot;

use crate::change::{ChangeEvent, ChangeKind, TableChangeType, TableEvent};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::feed::Feed;
use crate::index::IndexMismatch;
use crate::observer::{Attribution, Handle, HandleCache, Observed, Observer, RecordHandle};
use crate::table::Table;
use crate::transaction::TransactionLog;
use crate::types::RecordId;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tabula_codec::{BigInt, Heap, Key, Node, NodeId, Symbol, Value};
use tracing::{debug, trace, warn};

/// An in-process store of named tables.
///
/// `Store` owns:
/// - the [`Heap`] every stored composite lives in
/// - the tables, each a record map plus its indices
/// - the transaction log of undo frames
/// - the change and table-change feeds
///
/// Values are built in the heap (see [`heap_mut`](Self::heap_mut)) and
/// then inserted with [`add_record`](Self::add_record). After insertion,
/// edits go through [`observe`](Self::observe) so that indices, the
/// transaction log and subscribers all see them.
///
/// # Example
///
/// ```rust
/// use tabula_core::Store;
/// use tabula_codec::Value;
///
/// let mut store = Store::new();
/// store.create_table("users", &["email"]);
///
/// let john = store.heap_mut().object([
///     ("name", Value::from("John")),
///     ("email", Value::from("j@x.com")),
/// ]);
/// let john = store.add_record("users", john).unwrap();
///
/// let found = store.get_records_by_column("users", "email", &Value::from("j@x.com")).unwrap();
/// assert_eq!(found, vec![john.clone()]);
///
/// store.remove_record("users", &john).unwrap();
/// assert_eq!(store.record_count("users").unwrap(), 0);
/// ```
///
/// The store performs no internal locking for its data. Callers sharing
/// one across threads must serialize access externally.
pub struct Store {
    config: StoreConfig,
    heap: Heap,
    tables: BTreeMap<String, Table>,
    log: TransactionLog,
    handles: HandleCache,
    changes: Feed<ChangeEvent>,
    table_events: Feed<TableEvent>,
}

impl Store {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        let history = config.max_feed_history;
        Self {
            config,
            heap: Heap::new(),
            tables: BTreeMap::new(),
            log: TransactionLog::new(),
            handles: HandleCache::default(),
            changes: Feed::with_max_history(history),
            table_events: Feed::with_max_history(history),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The arena holding every composite value.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable arena access, for building values before insertion.
    ///
    /// Changes made here to values that are already stored bypass index
    /// maintenance and the transaction log.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Read access to a table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// All tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    fn table_ref(&self, name: &str) -> StoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::table_not_found(name).reported())
    }

    // =========================================================================
    // Tables and indices
    // =========================================================================

    /// Creates a table with indices on `indexed_columns`.
    ///
    /// Idempotent: on an existing table only the missing indices are added
    /// and no data is touched. Returns true if the table was created.
    pub fn create_table(&mut self, name: &str, indexed_columns: &[&str]) -> bool {
        let created = !self.tables.contains_key(name);
        if created {
            self.tables.insert(name.to_string(), Table::new(name));
            debug!(table = name, "table created");
            self.table_events
                .emit(TableEvent::table(TableChangeType::TableCreated, name));
        } else {
            debug!(table = name, "table already exists");
        }
        for column in indexed_columns {
            if !self.index_exists(name, column) {
                // The table exists at this point, so this cannot fail.
                let _ = self.add_index(name, column);
            }
        }
        created
    }

    /// Deletes a table and all of its records.
    pub fn delete_table(&mut self, name: &str) -> StoreResult<()> {
        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| StoreError::table_not_found(name).reported())?;
        for (id, _) in table.records() {
            self.handles.evict_record(name, id);
        }
        debug!(table = name, records = table.len(), "table deleted");
        self.table_events
            .emit(TableEvent::table(TableChangeType::TableDeleted, name));
        Ok(())
    }

    /// Returns true if the table exists.
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Adds an index on `column`, populated from the current records.
    pub fn add_index(&mut self, table: &str, column: &str) -> StoreResult<()> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table).reported())?;
        if !t.add_index(column, &self.heap) {
            return Err(StoreError::IndexAlreadyExists {
                table: table.to_string(),
                column: column.to_string(),
            }
            .reported());
        }
        debug!(table, column, records = t.len(), "index added");
        self.table_events
            .emit(TableEvent::index(TableChangeType::IndexAdded, table, column));
        Ok(())
    }

    /// Removes the index on `column`.
    pub fn remove_index(&mut self, table: &str, column: &str) -> StoreResult<()> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table).reported())?;
        if !t.remove_index(column) {
            return Err(StoreError::IndexNotFound {
                table: table.to_string(),
                column: column.to_string(),
            }
            .reported());
        }
        debug!(table, column, "index removed");
        self.table_events
            .emit(TableEvent::index(TableChangeType::IndexRemoved, table, column));
        Ok(())
    }

    /// Returns true if `column` of `table` is indexed.
    pub fn index_exists(&self, table: &str, column: &str) -> bool {
        self.tables.get(table).is_some_and(|t| t.has_index(column))
    }

    /// Rebuilds an index from a full scan.
    pub fn rebuild_index(&mut self, table: &str, column: &str) -> StoreResult<()> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table).reported())?;
        if !t.rebuild_index(column, &self.heap) {
            return Err(StoreError::IndexNotFound {
                table: table.to_string(),
                column: column.to_string(),
            }
            .reported());
        }
        debug!(table, column, "index rebuilt");
        Ok(())
    }

    /// Checks every index of every table against the records.
    pub fn verify_indices(&self) -> Vec<IndexMismatch> {
        self.tables
            .values()
            .flat_map(|t| t.verify(&self.heap))
            .collect()
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Inserts an object as a new record with the next identifier.
    ///
    /// # Errors
    ///
    /// `TableNotFound` if the table is absent, `InvalidRecord` if `value`
    /// is not an object in this store's heap or is already a record,
    /// `IdsExhausted` once the table has assigned the largest identifier.
    pub fn add_record(&mut self, table: &str, value: Value) -> StoreResult<RecordHandle> {
        let next = self.table_ref(table)?.last_id().next().ok_or_else(|| {
            StoreError::IdsExhausted {
                table: table.to_string(),
            }
            .reported()
        })?;
        let node = self.check_new_record(table, &value)?;
        self.insert_record(table, next, node)
    }

    /// Inserts or overwrites the record at `id`.
    ///
    /// Used when importing records whose identifiers must be kept. The
    /// table's counter only moves forward.
    pub fn set_record(&mut self, table: &str, value: Value, id: RecordId) -> StoreResult<RecordHandle> {
        let existing = self.table_ref(table)?.node_of(id);
        if let (Some(current), Some(node)) = (existing, value.as_node()) {
            if current == node {
                let name = self.table_ref(table)?.shared_name();
                return Ok(self.handles.root(node, name, id));
            }
        }
        let node = self.check_new_record(table, &value)?;
        if let Some(current) = existing {
            self.submit_record(table, id, current, ChangeKind::RecordRemoved)?;
        }
        self.insert_record(table, id, node)
    }

    fn check_new_record(&self, table: &str, value: &Value) -> StoreResult<NodeId> {
        let node = match value {
            Value::Node(node) => *node,
            other => {
                return Err(StoreError::invalid_record(
                    table,
                    format!("expected an object, found {}", other.kind_name()),
                )
                .reported())
            }
        };
        match self.heap.node(node) {
            Some(Node::Object(_)) => {}
            Some(other) => {
                return Err(StoreError::invalid_record(
                    table,
                    format!("expected an object, found {}", other.kind()),
                )
                .reported())
            }
            None => return Err(StoreError::UnknownNode { node }.reported()),
        }
        if let Some(owner) = self.tables.values().find(|t| t.record_of(node).is_some()) {
            return Err(StoreError::invalid_record(
                table,
                format!("{node} is already a record of {}", owner.name()),
            )
            .reported());
        }
        Ok(node)
    }

    fn insert_record(&mut self, table: &str, id: RecordId, node: NodeId) -> StoreResult<RecordHandle> {
        self.heap.set_field(
            node,
            Key::Symbol(Symbol::record_id()),
            Value::BigInt(BigInt::from(id.as_u64())),
        );
        self.submit_record(table, id, node, ChangeKind::RecordAdded)?;
        let name = self.table_ref(table)?.shared_name();
        Ok(self.handles.root(node, name, id))
    }

    fn submit_record(&mut self, table: &str, id: RecordId, node: NodeId, kind: ChangeKind) -> StoreResult<()> {
        let name = self.table_ref(table)?.shared_name();
        self.submit(ChangeEvent {
            table: name,
            record: id,
            column: None,
            target: node,
            kind,
        })
    }

    /// Removes the record behind `record`.
    ///
    /// # Errors
    ///
    /// `TableNotFound`, or `RecordNotFound` if the handle is not a live
    /// record root of `table`.
    pub fn remove_record(&mut self, table: &str, record: &RecordHandle) -> StoreResult<()> {
        let t = self.table_ref(table)?;
        if record.table() != table || t.node_of(record.id()) != Some(record.node()) {
            return Err(StoreError::RecordNotFound {
                table: table.to_string(),
                id: record.id(),
            }
            .reported());
        }
        self.remove_record_by_id(table, record.id())
    }

    /// Removes the record with identifier `id`.
    pub fn remove_record_by_id(&mut self, table: &str, id: RecordId) -> StoreResult<()> {
        let node = self.table_ref(table)?.node_of(id).ok_or_else(|| {
            StoreError::RecordNotFound {
                table: table.to_string(),
                id,
            }
            .reported()
        })?;
        self.submit_record(table, id, node, ChangeKind::RecordRemoved)
    }

    /// Removes every record whose `column` equals `value`. Returns how many
    /// were removed.
    pub fn remove_records_by_column(&mut self, table: &str, column: &str, value: &Value) -> StoreResult<usize> {
        let ids = self.table_ref(table)?.lookup(&self.heap, column, value);
        for id in &ids {
            self.remove_record_by_id(table, *id)?;
        }
        Ok(ids.len())
    }

    /// Looks up a record. A missing record is `Ok(None)`.
    pub fn get_record(&mut self, table: &str, id: RecordId) -> StoreResult<Option<RecordHandle>> {
        let (name, node) = {
            let t = self.table_ref(table)?;
            (t.shared_name(), t.node_of(id))
        };
        Ok(node.map(|node| self.handles.root(node, name, id)))
    }

    /// Every record, in identifier order.
    pub fn get_all_records(&mut self, table: &str) -> StoreResult<Vec<RecordHandle>> {
        let ids: Vec<(RecordId, NodeId)> = self.table_ref(table)?.records().collect();
        Ok(self.record_handles(table, ids))
    }

    /// Records whose `column` equals `value`, in identifier order.
    ///
    /// Uses the column's index when there is one and a full scan otherwise;
    /// both return the same records.
    pub fn get_records_by_column(&mut self, table: &str, column: &str, value: &Value) -> StoreResult<Vec<RecordHandle>> {
        let t = self.table_ref(table)?;
        let ids: Vec<(RecordId, NodeId)> = t
            .lookup(&self.heap, column, value)
            .into_iter()
            .filter_map(|id| t.node_of(id).map(|node| (id, node)))
            .collect();
        Ok(self.record_handles(table, ids))
    }

    /// Records whose root object satisfies `predicate`, in identifier order.
    pub fn filter_records<F>(&mut self, table: &str, mut predicate: F) -> StoreResult<Vec<RecordHandle>>
    where
        F: FnMut(&Heap, &Node) -> bool,
    {
        let heap = &self.heap;
        let ids: Vec<(RecordId, NodeId)> = self
            .table_ref(table)?
            .records()
            .filter(|(_, node)| heap.node(*node).is_some_and(|n| predicate(heap, n)))
            .collect();
        Ok(self.record_handles(table, ids))
    }

    /// Number of records in `table`.
    pub fn record_count(&self, table: &str) -> StoreResult<usize> {
        Ok(self.table_ref(table)?.len())
    }

    fn record_handles(&mut self, table: &str, ids: Vec<(RecordId, NodeId)>) -> Vec<RecordHandle> {
        let name: Arc<str> = match self.tables.get(table) {
            Some(t) => t.shared_name(),
            None => Arc::from(table),
        };
        ids.into_iter()
            .map(|(id, node)| self.handles.root(node, Arc::clone(&name), id))
            .collect()
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Opens `handle` for reading and writing.
    pub fn observe(&mut self, handle: &Handle) -> Observer<'_> {
        Observer::new(self, handle.clone())
    }

    pub(crate) fn is_root(&self, handle: &Handle) -> bool {
        handle.column().is_none()
            && self
                .tables
                .get(handle.table())
                .is_some_and(|t| t.node_of(handle.id()) == Some(handle.node()))
    }

    /// Writes are only accepted while the owning record is stored and the
    /// handle still points into it. A record replaced by `set_record`
    /// keeps its identifier but not its nodes.
    pub(crate) fn ensure_live(&self, handle: &Handle) -> StoreResult<()> {
        let root = self
            .tables
            .get(handle.table())
            .and_then(|t| t.node_of(handle.id()));
        let live = root.is_some_and(|root| {
            root == handle.node()
                || self.handles.get(handle.node()) == Some(handle)
                || self.heap.reaches(root, handle.node())
        });
        if live {
            Ok(())
        } else {
            Err(StoreError::RecordNotFound {
                table: handle.table().to_string(),
                id: handle.id(),
            }
            .reported())
        }
    }

    pub(crate) fn ensure_value(&self, value: &Value) -> StoreResult<()> {
        match value.as_node() {
            Some(node) if self.heap.node(node).is_none() => {
                Err(StoreError::UnknownNode { node }.reported())
            }
            _ => Ok(()),
        }
    }

    /// Wraps a value read through `parent`.
    ///
    /// Children of a record root are attributed to the field they were
    /// read from; deeper values inherit the parent's column. A value that
    /// is itself a stored record comes back as that record's root handle.
    pub(crate) fn wrap_child(&mut self, parent: &Handle, field: Option<&str>, value: Value) -> Observed {
        let Value::Node(node) = value else {
            return Observed::Value(value);
        };
        let owner = self
            .tables
            .values()
            .find_map(|t| t.record_of(node).map(|id| (t.shared_name(), id)));
        if let Some((table, record)) = owner {
            return Observed::Handle(self.handles.root(node, table, record));
        }
        let column = if self.is_root(parent) {
            field.map(Arc::from)
        } else {
            parent.origin().column.clone()
        };
        let origin = parent.origin();
        Observed::Handle(self.handles.wrap(node, || Attribution {
            table: Arc::clone(&origin.table),
            record: origin.record,
            column,
        }))
    }

    /// Number of cached handles.
    pub fn cached_handles(&self) -> usize {
        self.handles.len()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Opens a transaction frame. Frames nest.
    pub fn begin(&mut self) {
        self.log.begin();
        debug!(depth = self.log.depth(), "transaction begun");
    }

    /// Closes the innermost frame, keeping its changes.
    ///
    /// # Errors
    ///
    /// `NoActiveTransaction` if no frame is open.
    pub fn commit(&mut self) -> StoreResult<()> {
        let frame = self.log.commit()?;
        debug!(events = frame.len(), depth = self.log.depth(), "transaction committed");
        Ok(())
    }

    /// Closes the innermost frame and undoes its changes, newest first.
    ///
    /// Undo steps are dispatched to change hooks but not logged to any
    /// enclosing frame. A step that can no longer be applied (for example
    /// because its table was deleted) is skipped with a warning.
    ///
    /// # Errors
    ///
    /// `NoActiveTransaction` if no frame is open.
    pub fn rollback(&mut self) -> StoreResult<()> {
        let frame = self.log.rollback()?;
        let events = frame.len();
        for inverse in frame.undo_events() {
            match self.apply(&inverse) {
                Ok(()) => self.dispatch(inverse),
                Err(err) => warn!(
                    error = %err,
                    table = %inverse.table,
                    record = %inverse.record,
                    kind = inverse.kind.name(),
                    "skipping undo step"
                ),
            }
        }
        debug!(events, depth = self.log.depth(), "transaction rolled back");
        Ok(())
    }

    /// Returns true if a frame is open.
    pub fn in_transaction(&self) -> bool {
        self.log.is_active()
    }

    /// Number of open frames.
    pub fn transaction_depth(&self) -> usize {
        self.log.depth()
    }

    // =========================================================================
    // Change dispatch
    // =========================================================================

    /// Applies, logs and dispatches one mutation.
    pub(crate) fn submit(&mut self, event: ChangeEvent) -> StoreResult<()> {
        self.apply(&event)?;
        self.log.record(&event);
        self.dispatch(event);
        Ok(())
    }

    fn dispatch(&self, event: ChangeEvent) {
        if self.config.trace_changes {
            trace!(
                table = %event.table,
                record = %event.record,
                column = event.column.as_deref().unwrap_or("-"),
                target = %event.target,
                kind = event.kind.name(),
                "change dispatched"
            );
        }
        self.changes.emit(event);
    }

    /// Registers a hook called with every change, including undo steps.
    pub fn on_change<F>(&self, hook: F)
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        self.changes.on_event(hook);
    }

    /// Registers a hook called on table and index creation or removal.
    pub fn on_table_change<F>(&self, hook: F)
    where
        F: FnMut(&TableEvent) + Send + 'static,
    {
        self.table_events.on_event(hook);
    }

    /// Subscribes to changes over a channel.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Subscribes to table events over a channel.
    pub fn subscribe_tables(&self) -> Receiver<TableEvent> {
        self.table_events.subscribe()
    }

    /// The change feed.
    pub fn changes(&self) -> &Feed<ChangeEvent> {
        &self.changes
    }

    /// The table event feed.
    pub fn table_events(&self) -> &Feed<TableEvent> {
        &self.table_events
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("tables", &self.table_names())
            .field("nodes", &self.heap.len())
            .field("transaction_depth", &self.log.depth())
            .finish_non_exhaustive()
    }
}
