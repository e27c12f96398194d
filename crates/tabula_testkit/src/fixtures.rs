//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up stores and common test
//! scenarios.

use std::path::{Path, PathBuf};
use tabula_codec::{encode_bytes, Value};
use tabula_core::{RecordHandle, RecordId, Store, StoreConfig};
use tempfile::TempDir;

/// Name of the table created by [`users_store`].
pub const USERS: &str = "users";

/// Name of the table created by [`mutable_record`].
pub const ITEMS: &str = "items";

/// Creates a store with a `users` table indexed on `email`.
pub fn users_store() -> Store {
    let mut store = Store::new();
    store.create_table(USERS, &["email"]);
    store
}

/// Adds a `{name, email}` user.
pub fn add_user(store: &mut Store, name: &str, email: &str) -> RecordHandle {
    let value = store
        .heap_mut()
        .object([("name", Value::from(name)), ("email", Value::from(email))]);
    store.add_record(USERS, value).expect("Failed to add user")
}

/// Creates the `items` table (indexed on `email` and `age`) if needed and
/// adds a record holding a `list`, a `map` and a `set`.
pub fn mutable_record(store: &mut Store) -> RecordHandle {
    store.create_table(ITEMS, &["email", "age"]);
    let heap = store.heap_mut();
    let list = heap.list([Value::from(1), Value::from(2), Value::from(3)]);
    let map = heap.map([(Value::from("a"), Value::from(1))]);
    let set = heap.set([Value::from(1), Value::from("b")]);
    let record = heap.object([
        ("email", Value::from("a")),
        ("age", Value::from(1)),
        ("list", list),
        ("map", map),
        ("set", set),
    ]);
    store
        .add_record(ITEMS, record)
        .expect("Failed to add mutable record")
}

/// Encodes every record of every table on its own, keyed by table and id.
///
/// Unlike [`Store::serialize`], the result ignores identifier counters, so
/// two stores whose records match compare equal even if one of them
/// allocated and rolled back identifiers.
pub fn table_contents(store: &Store) -> Vec<(String, Vec<(RecordId, Vec<u8>)>)> {
    let symbols = store.config().snapshot_symbols();
    store
        .tables()
        .map(|table| {
            let records = table
                .records()
                .map(|(id, node)| (id, encode_bytes(store.heap(), &Value::Node(node), &symbols)))
                .collect();
            (table.name().to_string(), records)
        })
        .collect()
}

/// A snapshot written to a temporary file.
pub struct TempSnapshot {
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempSnapshot {
    /// Serializes `store` into a fresh temporary file.
    pub fn write(store: &Store) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.tabula");
        std::fs::write(&path, store.serialize()).expect("Failed to write snapshot");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot bytes back.
    pub fn read(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("Failed to read snapshot")
    }

    /// Loads the snapshot into a new store with `config`.
    pub fn load(&self, config: StoreConfig) -> Store {
        Store::from_snapshot(&self.read(), config).expect("Failed to load snapshot")
    }
}

/// Runs a test against a fresh [`users_store`].
pub fn with_users<F, R>(f: F) -> R
where
    F: FnOnce(&mut Store) -> R,
{
    let mut store = users_store();
    f(&mut store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A users store with `count` records; every third shares the email
    /// `shared@example.com`.
    pub fn populated_users(count: usize) -> (Store, Vec<RecordHandle>) {
        let mut store = users_store();
        let handles = (0..count)
            .map(|i| {
                let email = if i % 3 == 0 {
                    "shared@example.com".to_string()
                } else {
                    format!("user{i}@example.com")
                };
                add_user(&mut store, &format!("user{i}"), &email)
            })
            .collect();
        (store, handles)
    }

    /// A store whose `users` records point at each other: every user has
    /// a `friend` field referencing the next one, and the last points back
    /// to the first.
    pub fn friend_ring(count: usize) -> (Store, Vec<RecordHandle>) {
        let (mut store, handles) = populated_users(count);
        for (i, handle) in handles.iter().enumerate() {
            let next = &handles[(i + 1) % handles.len()];
            store
                .observe(handle)
                .set("friend", next.value())
                .expect("Failed to link friend");
        }
        (store, handles)
    }
}
