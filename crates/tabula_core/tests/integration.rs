//! Integration tests for the store, observer, transactions and snapshots.

use std::sync::{Arc, Mutex};
use tabula_codec::{structurally_equal, BigInt, Key, Node, Symbol, Value};
use tabula_core::{
    ChangeKind, Observed, RecordId, Store, StoreConfig, StoreError, TableChangeType,
};
use tabula_testkit::prelude::*;

fn texts(store: &mut Store, list: &tabula_core::Handle) -> Vec<Value> {
    store
        .observe(list)
        .iter()
        .unwrap()
        .map(Value::from)
        .collect()
}

fn list_field(store: &mut Store, record: &tabula_core::Handle, field: &str) -> tabula_core::Handle {
    store
        .observe(record)
        .get(field)
        .unwrap()
        .and_then(Observed::into_handle)
        .unwrap()
}

#[test]
fn users_lookup_and_remove() {
    let mut store = users_store();
    let john = add_user(&mut store, "John", "j@x.com");

    let found = store
        .get_records_by_column(USERS, "email", &Value::from("j@x.com"))
        .unwrap();
    assert_eq!(found.len(), 1);
    let name = store.observe(&found[0]).get("name").unwrap().map(Value::from);
    assert_eq!(name, Some(Value::from("John")));

    store.remove_record(USERS, &john).unwrap();
    assert!(store
        .get_records_by_column(USERS, "email", &Value::from("j@x.com"))
        .unwrap()
        .is_empty());
    assert!(store.get_all_records(USERS).unwrap().is_empty());
}

#[test]
fn hobbies_push_and_splice_roll_back() {
    let mut store = users_store();
    let hobbies = store
        .heap_mut()
        .list([Value::from("a"), Value::from("b"), Value::from("c")]);
    let user = store.heap_mut().object([("hobbies", hobbies.clone())]);
    let user = store.add_record(USERS, user).unwrap();
    let list = list_field(&mut store, &user, "hobbies");

    store.begin();
    assert_eq!(store.observe(&list).push("d").unwrap(), 4);
    let removed = store
        .observe(&list)
        .splice(1, 1, [Value::from("x"), Value::from("y")])
        .unwrap();
    assert_eq!(removed.into_iter().map(Value::from).collect::<Vec<_>>(), vec![Value::from("b")]);
    assert_eq!(
        texts(&mut store, &list),
        ["a", "x", "y", "c", "d"].map(Value::from).to_vec()
    );
    store.rollback().unwrap();

    assert_eq!(texts(&mut store, &list), ["a", "b", "c"].map(Value::from).to_vec());
    assert_eq!(list.value(), hobbies);
    assert!(!store.in_transaction());
}

#[test]
fn reassigning_indexed_field_moves_bucket() {
    let mut store = users_store();
    let user = add_user(&mut store, "John", "old@x.com");

    store.observe(&user).set("email", "new@x.com").unwrap();

    let table = store.table(USERS).unwrap();
    let index = table.index("email").unwrap();
    assert!(index.lookup(&Value::from("old@x.com")).is_empty());
    assert_eq!(index.lookup(&Value::from("new@x.com")), vec![user.id()]);
    assert!(store.verify_indices().is_empty());
}

#[test]
fn deleting_indexed_field_unindexes_record() {
    let mut store = users_store();
    let user = add_user(&mut store, "John", "j@x.com");

    let old = store.observe(&user).delete("email").unwrap().map(Value::from);
    assert_eq!(old, Some(Value::from("j@x.com")));

    let index = store.table(USERS).unwrap().index("email").unwrap();
    assert!(index.is_empty());
    assert!(index.lookup(&Value::Undefined).is_empty());
    assert!(store.verify_indices().is_empty());

    store.begin();
    store.observe(&user).set("email", "again@x.com").unwrap();
    store.rollback().unwrap();
    assert!(store.table(USERS).unwrap().index("email").unwrap().is_empty());
}

#[test]
fn record_id_key_is_reserved() {
    let mut store = users_store();
    let user = add_user(&mut store, "John", "j@x.com");
    let err = store
        .observe(&user)
        .set(Key::Symbol(Symbol::record_id()), 7)
        .unwrap_err();
    assert!(matches!(err, StoreError::ReservedKey { .. }));
    assert!(matches!(
        store.observe(&user).delete(Key::Symbol(Symbol::record_id())),
        Err(StoreError::ReservedKey { .. })
    ));
}

#[test]
fn handles_are_referentially_stable() {
    let mut store = users_store();
    let pets = store.heap_mut().list([]);
    let user = store.heap_mut().object([("pets", pets)]);
    let user = store.add_record(USERS, user).unwrap();

    let a = list_field(&mut store, &user, "pets");
    let b = list_field(&mut store, &user, "pets");
    assert_eq!(a, b);
    assert_eq!(a.column(), Some("pets"));
    assert_eq!(store.get_record(USERS, user.id()).unwrap(), Some(user.clone()));

    let cached = store.cached_handles();
    store.remove_record(USERS, &user).unwrap();
    assert!(store.cached_handles() < cached);
}

#[test]
fn iteration_yields_attributed_handles() {
    let mut store = users_store();
    let rx = store.subscribe();
    let heap = store.heap_mut();
    let rex = heap.object([("name", Value::from("Rex"))]);
    let tom = heap.object([("name", Value::from("Tom"))]);
    let pets = heap.list([rex, tom]);
    let user = heap.object([("pets", pets)]);
    let user = store.add_record(USERS, user).unwrap();
    let pets = list_field(&mut store, &user, "pets");

    let items: Vec<Observed> = store.observe(&pets).iter().unwrap().collect();
    for item in &items {
        let pet = item.as_handle().unwrap();
        assert_eq!(pet.column(), Some("pets"));
        store.observe(pet).set("age", 3).unwrap();
    }

    store
        .observe(&pets)
        .for_each(|store, _, item| {
            let pet = item.into_handle().unwrap();
            store.observe(&pet).set("vaccinated", true)
        })
        .unwrap();

    for (_, item) in store.observe(&pets).entries().unwrap() {
        let pet = item.into_handle().unwrap();
        store.observe(&pet).delete("age").unwrap();
    }

    let nested: Vec<_> = rx
        .try_iter()
        .filter(|e| !matches!(e.kind, ChangeKind::RecordAdded))
        .collect();
    assert_eq!(nested.len(), 6);
    assert!(nested
        .iter()
        .all(|e| e.column.as_deref() == Some("pets") && e.record == user.id()));
}

#[test]
fn nested_commit_is_not_folded_into_outer_frame() {
    let mut store = users_store();
    let user = add_user(&mut store, "John", "j@x.com");

    store.begin();
    store.observe(&user).set("name", "Outer").unwrap();
    store.begin();
    store.observe(&user).set("email", "inner@x.com").unwrap();
    store.commit().unwrap();
    assert_eq!(store.transaction_depth(), 1);
    store.rollback().unwrap();

    let name = store.observe(&user).get("name").unwrap().map(Value::from);
    let email = store.observe(&user).get("email").unwrap().map(Value::from);
    assert_eq!(name, Some(Value::from("John")));
    assert_eq!(email, Some(Value::from("inner@x.com")));
    assert!(store.verify_indices().is_empty());
}

#[test]
fn inner_rollback_keeps_outer_frame_open() {
    let mut store = users_store();
    let user = add_user(&mut store, "John", "j@x.com");

    store.begin();
    let added = add_user(&mut store, "Jane", "jane@x.com");
    store.begin();
    store.remove_record(USERS, &user).unwrap();
    store.rollback().unwrap();

    assert!(store.in_transaction());
    assert_eq!(store.get_record(USERS, user.id()).unwrap(), Some(user.clone()));
    assert_eq!(
        store
            .get_records_by_column(USERS, "email", &Value::from("j@x.com"))
            .unwrap(),
        vec![user]
    );

    store.rollback().unwrap();
    assert_eq!(store.get_record(USERS, added.id()).unwrap(), None);
    assert!(matches!(store.rollback(), Err(StoreError::NoActiveTransaction)));

    // Identifiers handed out inside a rolled back frame are not reused.
    let next = add_user(&mut store, "Joe", "joe@x.com");
    assert_eq!(next.id(), RecordId::new(3));
}

#[test]
fn hooks_see_changes_and_undo_steps() {
    let mut store = Store::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tables = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        store.on_change(move |e| seen.lock().unwrap().push(e.kind.name()));
        let tables = Arc::clone(&tables);
        store.on_table_change(move |e| tables.lock().unwrap().push(e.change_type));
    }

    store.create_table(USERS, &["email"]);
    let user = add_user(&mut store, "John", "j@x.com");
    let tags = store.heap_mut().set([]);
    store.observe(&user).set("tags", tags).unwrap();
    let tags = list_field(&mut store, &user, "tags");

    store.begin();
    assert!(store.observe(&tags).add("admin").unwrap());
    assert!(!store.observe(&tags).add("admin").unwrap());
    store.rollback().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["record-added", "field-set", "set-added", "set-deleted"]
    );
    assert_eq!(
        *tables.lock().unwrap(),
        vec![TableChangeType::TableCreated, TableChangeType::IndexAdded]
    );
    assert_eq!(store.changes().latest_sequence(), 4);
}

#[test]
fn cleared_map_is_restored_in_order() {
    let mut store = users_store();
    let prefs = store.heap_mut().map([
        (Value::from("theme"), Value::from("dark")),
        (Value::from("lang"), Value::from("en")),
        (Value::from(1), Value::Null),
    ]);
    let user = store.heap_mut().object([("prefs", prefs)]);
    let user = store.add_record(USERS, user).unwrap();
    let prefs = list_field(&mut store, &user, "prefs");
    let before = tabula_codec::encode_bytes(
        store.heap(),
        &prefs.value(),
        &store.config().snapshot_symbols(),
    );

    store.begin();
    assert!(store.observe(&prefs).remove(&Value::from("theme")).unwrap());
    store.observe(&prefs).insert("theme", "light").unwrap();
    store.observe(&prefs).clear().unwrap();
    store.observe(&prefs).insert("new", 1).unwrap();
    store.rollback().unwrap();

    let after = tabula_codec::encode_bytes(
        store.heap(),
        &prefs.value(),
        &store.config().snapshot_symbols(),
    );
    assert_eq!(before, after);
}

#[test]
fn self_referencing_record_survives_snapshot() {
    let mut store = users_store();
    let user = store.heap_mut().object([("name", Value::from("John"))]);
    let node = user.as_node().unwrap();
    store.heap_mut().set_field(node, "self", user.clone());
    store.add_record(USERS, user).unwrap();

    let restored = Store::from_snapshot(&store.serialize(), StoreConfig::default()).unwrap();
    let (_, root) = restored.table(USERS).unwrap().records().next().unwrap();
    let Some(Node::Object(fields)) = restored.heap().node(root) else {
        panic!("expected object");
    };
    let this = fields
        .iter()
        .find(|(k, _)| *k == Key::from("self"))
        .map(|(_, v)| v.clone());
    assert_eq!(this, Some(Value::Node(root)));
}

#[test]
fn friend_ring_keeps_records_shared_across_snapshot() {
    let (store, handles) = scenarios::friend_ring(5);
    let snapshot = TempSnapshot::write(&store);
    let restored = snapshot.load(StoreConfig::default());

    assert_eq!(table_contents(&restored), table_contents(&store));
    let table = restored.table(USERS).unwrap();
    assert_eq!(table.last_id(), handles[4].id());
    for (id, node) in table.records() {
        let friend = restored.heap().node(node).unwrap().field(&Key::from("friend")).unwrap();
        let next = RecordId::new(id.as_u64() % 5 + 1);
        assert_eq!(friend.as_node(), table.node_of(next));
    }
    assert!(restored.verify_indices().is_empty());
}

#[test]
fn add_then_get_returns_the_same_graph() {
    let mut scratch = tabula_codec::Heap::new();
    let expected = scratch.object([
        ("name", Value::from("John")),
        ("age", Value::from(41)),
        ("big", Value::BigInt(BigInt::from(1u64 << 60))),
    ]);

    let mut store = users_store();
    let copy = store.heap_mut().object([
        ("name", Value::from("John")),
        ("age", Value::from(41)),
        ("big", Value::BigInt(BigInt::from(1u64 << 60))),
    ]);
    let added = store.add_record(USERS, copy).unwrap();
    scratch.set_field(
        expected.as_node().unwrap(),
        Key::Symbol(Symbol::record_id()),
        Value::BigInt(BigInt::from(added.id().as_u64())),
    );

    let got = store.get_record(USERS, added.id()).unwrap().unwrap();
    assert!(structurally_equal(store.heap(), &got.value(), &scratch, &expected));
}

#[test]
fn edits_through_a_linked_record_after_load_keep_indices_current() {
    let mut store = users_store();
    let bob = add_user(&mut store, "Bob", "b@x");
    let alice = add_user(&mut store, "Alice", "a@x");
    store.observe(&alice).set("friend", bob.value()).unwrap();

    let mut restored = Store::from_snapshot(&store.serialize(), StoreConfig::default()).unwrap();
    let alice = restored
        .get_records_by_column(USERS, "email", &Value::from("a@x"))
        .unwrap()
        .remove(0);
    let friend = list_field(&mut restored, &alice, "friend");
    assert_eq!(friend.id(), bob.id());
    assert_eq!(friend.column(), None);

    restored.observe(&friend).set("email", "b2@x").unwrap();

    assert!(restored.verify_indices().is_empty());
    let found = restored
        .get_records_by_column(USERS, "email", &Value::from("b2@x"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), bob.id());
    assert!(restored
        .get_records_by_column(USERS, "email", &Value::from("b@x"))
        .unwrap()
        .is_empty());
}

#[test]
fn deeply_nested_record_survives_snapshot() {
    let mut store = users_store();
    let mut inner = Value::from("bottom");
    for _ in 0..200_000 {
        inner = store.heap_mut().list([inner]);
    }
    let user = store
        .heap_mut()
        .object([("email", Value::from("deep@x")), ("nest", inner)]);
    let handle = store.add_record(USERS, user).unwrap();

    let restored = Store::from_snapshot(&store.serialize(), StoreConfig::default()).unwrap();
    let root = restored.table(USERS).unwrap().node_of(handle.id()).unwrap();
    assert!(structurally_equal(
        store.heap(),
        &Value::Node(handle.node()),
        restored.heap(),
        &Value::Node(root),
    ));
}

#[test]
fn load_rejects_deeply_nested_garbage() {
    let mut store = users_store();
    add_user(&mut store, "John", "j@x.com");

    let mut bytes = vec![0x81; 1_000_000];
    bytes.push(0xf6);
    assert!(matches!(
        store.load(&bytes),
        Err(StoreError::InvalidSnapshot { .. })
    ));

    bytes.pop();
    assert!(store.load(&bytes).is_err());
    assert_eq!(store.record_count(USERS).unwrap(), 1);
}
