//! Property-based test generators using proptest.
//!
//! Provides strategies for scalars, arbitrary (shared and cyclic) value
//! graphs, flat records and sequences of observed mutations.

use proptest::prelude::*;
use tabula_codec::{BigInt, Heap, Key, Node, NodeId, Value};
use tabula_core::{Handle, RecordHandle, Store, StoreError, StoreResult};

/// Strategy for scalar values of every kind except symbols.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Undefined),
        1 => Just(Value::Null),
        2 => any::<bool>().prop_map(Value::Bool),
        3 => (-1.0e6f64..1.0e6).prop_map(Value::Number),
        1 => Just(Value::Number(f64::NAN)),
        3 => "[a-z ]{0,12}".prop_map(Value::Text),
        1 => any::<i64>().prop_map(|n| Value::BigInt(BigInt::from(n))),
    ]
}

/// Strategy for values drawn from a small pool, so that equal values (and
/// the SameValueZero corner cases) collide often.
pub fn pooled_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        Just(Value::Number(0.0)),
        Just(Value::Number(-0.0)),
        Just(Value::Number(f64::NAN)),
        (1u32..4).prop_map(Value::from),
        prop::sample::select(vec!["a", "b", "c"]).prop_map(Value::from),
    ]
}

/// Strategy for valid table and column names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// One slot of a [`NodeRecipe`]: a scalar or a reference to another node
/// of the same recipe.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Inline scalar.
    Scalar(Value),
    /// Index into [`GraphRecipe::nodes`].
    Node(usize),
}

/// Blueprint of one composite node.
#[derive(Debug, Clone)]
pub enum NodeRecipe {
    /// Object with named fields.
    Object(Vec<(String, Slot)>),
    /// List.
    List(Vec<Slot>),
    /// Set; duplicate slots collapse when built.
    Set(Vec<Slot>),
    /// Map; duplicate keys keep their first value.
    Map(Vec<(Slot, Slot)>),
    /// Date in milliseconds.
    Date(f64),
}

/// Blueprint of a value graph whose root (node 0) is always an object.
///
/// Nodes may reference any node, including themselves and the root, so
/// recipes describe shared substructure and cycles.
#[derive(Debug, Clone)]
pub struct GraphRecipe {
    /// The nodes; index 0 is the root.
    pub nodes: Vec<NodeRecipe>,
}

impl GraphRecipe {
    /// Allocates the graph in `heap` and returns its root.
    pub fn build(&self, heap: &mut Heap) -> Value {
        let ids: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|recipe| {
                heap.alloc(match recipe {
                    NodeRecipe::Object(_) => Node::Object(Vec::new()),
                    NodeRecipe::List(_) => Node::List(Vec::new()),
                    NodeRecipe::Set(_) => Node::Set(Vec::new()),
                    NodeRecipe::Map(_) => Node::Map(Vec::new()),
                    NodeRecipe::Date(ms) => Node::Date(*ms),
                })
            })
            .collect();

        let resolve = |slot: &Slot| match slot {
            Slot::Scalar(v) => v.clone(),
            Slot::Node(i) => Value::Node(ids[*i]),
        };

        for (recipe, id) in self.nodes.iter().zip(&ids) {
            let Some(node) = heap.node_mut(*id) else {
                continue;
            };
            match (recipe, node) {
                (NodeRecipe::Object(fields), Node::Object(out)) => {
                    for (name, slot) in fields {
                        let key = Key::from(name.as_str());
                        if !out.iter().any(|(k, _)| *k == key) {
                            out.push((key, resolve(slot)));
                        }
                    }
                }
                (NodeRecipe::List(items), Node::List(out)) => {
                    out.extend(items.iter().map(resolve));
                }
                (NodeRecipe::Set(items), Node::Set(out)) => {
                    for item in items.iter().map(resolve) {
                        if !out.contains(&item) {
                            out.push(item);
                        }
                    }
                }
                (NodeRecipe::Map(entries), Node::Map(out)) => {
                    for (k, v) in entries {
                        let key = resolve(k);
                        if !out.iter().any(|(existing, _)| *existing == key) {
                            out.push((key, resolve(v)));
                        }
                    }
                }
                _ => {}
            }
        }

        Value::Node(ids[0])
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a recipe has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn slot_strategy(nodes: usize) -> impl Strategy<Value = Slot> {
    prop_oneof![
        3 => scalar_strategy().prop_map(Slot::Scalar),
        1 => (0..nodes).prop_map(Slot::Node),
    ]
}

fn object_recipe_strategy(nodes: usize) -> impl Strategy<Value = NodeRecipe> {
    prop::collection::vec(("[a-z]{1,6}", slot_strategy(nodes)), 0..6).prop_map(NodeRecipe::Object)
}

fn node_recipe_strategy(nodes: usize) -> impl Strategy<Value = NodeRecipe> {
    let items = || prop::collection::vec(slot_strategy(nodes), 0..6);
    prop_oneof![
        3 => object_recipe_strategy(nodes),
        3 => items().prop_map(NodeRecipe::List),
        2 => items().prop_map(NodeRecipe::Set),
        2 => prop::collection::vec((slot_strategy(nodes), slot_strategy(nodes)), 0..5)
            .prop_map(NodeRecipe::Map),
        1 => (0.0f64..4.0e12).prop_map(|ms| NodeRecipe::Date(ms.floor())),
    ]
}

/// Strategy for graph recipes with up to `max_nodes` nodes.
pub fn graph_recipe_strategy(max_nodes: usize) -> impl Strategy<Value = GraphRecipe> {
    (1..=max_nodes.max(1)).prop_flat_map(|n| {
        (
            object_recipe_strategy(n),
            prop::collection::vec(node_recipe_strategy(n), n - 1),
        )
            .prop_map(|(root, rest)| {
                let mut nodes = Vec::with_capacity(rest.len() + 1);
                nodes.push(root);
                nodes.extend(rest);
                GraphRecipe { nodes }
            })
    })
}

/// Blueprint of a flat record.
#[derive(Debug, Clone)]
pub struct RecordRecipe {
    /// Fields in insertion order.
    pub fields: Vec<(String, Value)>,
}

impl RecordRecipe {
    /// Allocates the record object in `heap`.
    pub fn build(&self, heap: &mut Heap) -> Value {
        heap.object(
            self.fields
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone())),
        )
    }
}

/// Columns used by [`record_recipe_strategy`].
pub const RECORD_COLUMNS: [&str; 3] = ["email", "age", "name"];

/// Strategy for records whose [`RECORD_COLUMNS`] are each present or
/// absent and hold pooled values.
pub fn record_recipe_strategy() -> impl Strategy<Value = RecordRecipe> {
    prop::collection::vec(prop::option::of(pooled_value_strategy()), RECORD_COLUMNS.len()).prop_map(
        |values| RecordRecipe {
            fields: RECORD_COLUMNS
                .iter()
                .zip(values)
                .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
                .collect(),
        },
    )
}

/// One observed edit against a record built by
/// [`mutable_record`](crate::fixtures::mutable_record).
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Set a root field.
    SetField {
        /// One of [`RECORD_COLUMNS`].
        column: &'static str,
        /// New value.
        value: Value,
    },
    /// Delete a root field.
    DeleteField {
        /// One of [`RECORD_COLUMNS`].
        column: &'static str,
    },
    /// Append to `list`.
    Push(Value),
    /// Prepend to `list`.
    Unshift(Value),
    /// Remove the last element of `list`.
    Pop,
    /// Remove the first element of `list`.
    Shift,
    /// Overwrite an element of `list`; the index wraps to the length.
    SetAt {
        /// Position, taken modulo the list length.
        index: usize,
        /// New element.
        value: Value,
    },
    /// Splice `list`.
    Splice {
        /// Start position (clamped).
        start: usize,
        /// Elements to remove (clamped).
        delete_count: usize,
        /// Elements to insert.
        items: Vec<Value>,
    },
    /// Insert into `map`.
    MapInsert {
        /// Entry key.
        key: Value,
        /// Entry value.
        value: Value,
    },
    /// Remove from `map`.
    MapRemove(Value),
    /// Clear `map`.
    MapClear,
    /// Add to `set`.
    SetAdd(Value),
    /// Remove from `set`.
    SetRemove(Value),
    /// Clear `set`.
    SetClear,
}

/// Strategy for generating mutations.
pub fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    let column = || prop::sample::select(RECORD_COLUMNS.to_vec());
    let value = pooled_value_strategy;
    prop_oneof![
        3 => (column(), value()).prop_map(|(column, value)| Mutation::SetField { column, value }),
        1 => column().prop_map(|column| Mutation::DeleteField { column }),
        2 => value().prop_map(Mutation::Push),
        1 => value().prop_map(Mutation::Unshift),
        1 => Just(Mutation::Pop),
        1 => Just(Mutation::Shift),
        1 => (0usize..8, value()).prop_map(|(index, value)| Mutation::SetAt { index, value }),
        2 => (0usize..6, 0usize..4, prop::collection::vec(value(), 0..3))
            .prop_map(|(start, delete_count, items)| Mutation::Splice { start, delete_count, items }),
        2 => (value(), value()).prop_map(|(key, value)| Mutation::MapInsert { key, value }),
        1 => value().prop_map(Mutation::MapRemove),
        1 => Just(Mutation::MapClear),
        2 => value().prop_map(Mutation::SetAdd),
        1 => value().prop_map(Mutation::SetRemove),
        1 => Just(Mutation::SetClear),
    ]
}

/// Strategy for generating a sequence of mutations.
pub fn mutation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Mutation>> {
    prop::collection::vec(mutation_strategy(), min_ops..max_ops)
}

fn child(store: &mut Store, record: &RecordHandle, field: &'static str) -> StoreResult<Handle> {
    store
        .observe(record)
        .get(field)?
        .and_then(|observed| observed.into_handle())
        .ok_or_else(|| StoreError::invalid_target("container", format!("missing field {field}")))
}

impl Mutation {
    /// Applies this mutation through the store's observer API.
    pub fn apply(&self, store: &mut Store, record: &RecordHandle) -> StoreResult<()> {
        match self {
            Mutation::SetField { column, value } => store.observe(record).set(*column, value.clone()),
            Mutation::DeleteField { column } => store.observe(record).delete(*column).map(drop),
            Mutation::Push(value) => {
                let list = child(store, record, "list")?;
                store.observe(&list).push(value.clone()).map(drop)
            }
            Mutation::Unshift(value) => {
                let list = child(store, record, "list")?;
                store.observe(&list).unshift(value.clone()).map(drop)
            }
            Mutation::Pop => {
                let list = child(store, record, "list")?;
                store.observe(&list).pop().map(drop)
            }
            Mutation::Shift => {
                let list = child(store, record, "list")?;
                store.observe(&list).shift().map(drop)
            }
            Mutation::SetAt { index, value } => {
                let list = child(store, record, "list")?;
                let mut observer = store.observe(&list);
                let len = observer.len()?;
                if len == 0 {
                    return Ok(());
                }
                observer.set_at(index % len, value.clone())
            }
            Mutation::Splice {
                start,
                delete_count,
                items,
            } => {
                let list = child(store, record, "list")?;
                store
                    .observe(&list)
                    .splice(*start, *delete_count, items.iter().cloned())
                    .map(drop)
            }
            Mutation::MapInsert { key, value } => {
                let map = child(store, record, "map")?;
                store.observe(&map).insert(key.clone(), value.clone())
            }
            Mutation::MapRemove(key) => {
                let map = child(store, record, "map")?;
                store.observe(&map).remove(key).map(drop)
            }
            Mutation::MapClear => {
                let map = child(store, record, "map")?;
                store.observe(&map).clear()
            }
            Mutation::SetAdd(value) => {
                let set = child(store, record, "set")?;
                store.observe(&set).add(value.clone()).map(drop)
            }
            Mutation::SetRemove(value) => {
                let set = child(store, record, "set")?;
                store.observe(&set).remove(value).map(drop)
            }
            Mutation::SetClear => {
                let set = child(store, record, "set")?;
                store.observe(&set).clear()
            }
        }
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_codec::structurally_equal;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn graph_root_is_object(recipe in graph_recipe_strategy(6)) {
            let mut heap = Heap::new();
            let root = recipe.build(&mut heap);
            prop_assert!(matches!(heap.resolve(&root), Some(Node::Object(_))));
            prop_assert_eq!(heap.len(), recipe.len());
        }

        #[test]
        fn graph_sets_hold_unique_elements(recipe in graph_recipe_strategy(6)) {
            let mut heap = Heap::new();
            let root = recipe.build(&mut heap);
            prop_assert!(structurally_equal(&heap, &root, &heap, &root));
            for i in 0..heap.len() {
                if let Some(Node::Set(items)) = heap.node(NodeId(i as u32)) {
                    for (a, x) in items.iter().enumerate() {
                        prop_assert!(!items[a + 1..].contains(x));
                    }
                }
            }
        }

        #[test]
        fn record_recipe_uses_known_columns(recipe in record_recipe_strategy()) {
            for (name, _) in &recipe.fields {
                prop_assert!(RECORD_COLUMNS.contains(&name.as_str()));
            }
        }
    }
}
