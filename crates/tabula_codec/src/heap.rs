//! Arena of composite nodes.
//!
//! Composite values are stored as [`Node`]s in a [`Heap`] and referenced by
//! [`NodeId`]. A node may hold `Value::Node` references to any other node,
//! including itself, so shared substructure and cycles need no ownership
//! tricks.

use crate::value::{same_value_zero, Key, NodeId, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The composite kinds a node can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered list.
    List(Vec<Value>),
    /// Associative container with unique keys, in insertion order.
    Map(Vec<(Value, Value)>),
    /// Container of unique elements, in insertion order.
    Set(Vec<Value>),
    /// Plain keyed object, fields in insertion order.
    Object(Vec<(Key, Value)>),
    /// Instant in time, milliseconds since the Unix epoch.
    Date(f64),
}

/// Discriminant of [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// [`Node::List`].
    List,
    /// [`Node::Map`].
    Map,
    /// [`Node::Set`].
    Set,
    /// [`Node::Object`].
    Object,
    /// [`Node::Date`].
    Date,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::List => "list",
            NodeKind::Map => "map",
            NodeKind::Set => "set",
            NodeKind::Object => "object",
            NodeKind::Date => "date",
        })
    }
}

impl Node {
    /// Returns the kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::List(_) => NodeKind::List,
            Node::Map(_) => NodeKind::Map,
            Node::Set(_) => NodeKind::Set,
            Node::Object(_) => NodeKind::Object,
            Node::Date(_) => NodeKind::Date,
        }
    }

    /// Looks up an object field.
    pub fn field(&self, key: &Key) -> Option<&Value> {
        match self {
            Node::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Looks up a map entry.
    pub fn entry(&self, key: &Value) -> Option<&Value> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Number of elements, entries or fields. Dates have no length.
    pub fn len(&self) -> usize {
        match self {
            Node::List(items) | Node::Set(items) => items.len(),
            Node::Map(entries) => entries.len(),
            Node::Object(fields) => fields.len(),
            Node::Date(_) => 0,
        }
    }

    /// Returns true if the node has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arena owning every composite node of a store.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    nodes: Vec<Node>,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node and returns its id.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Returns the node behind `id`.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Returns the node behind `id` mutably.
    ///
    /// Mutations made this way are not observed; stored records should be
    /// edited through the store's observer instead.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Returns the node a value references, if it is composite.
    pub fn resolve(&self, value: &Value) -> Option<&Node> {
        value.as_node().and_then(|id| self.node(id))
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates an object. A repeated key overwrites the earlier value in
    /// place.
    pub fn object<K, I>(&mut self, fields: I) -> Value
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut out: Vec<(Key, Value)> = Vec::new();
        for (key, value) in fields {
            let key = key.into();
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Value::Node(self.alloc(Node::Object(out)))
    }

    /// Allocates a list.
    pub fn list<I: IntoIterator<Item = Value>>(&mut self, items: I) -> Value {
        Value::Node(self.alloc(Node::List(items.into_iter().collect())))
    }

    /// Allocates a map. A repeated key keeps its first position and takes
    /// the last value.
    pub fn map<I: IntoIterator<Item = (Value, Value)>>(&mut self, entries: I) -> Value {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Value::Node(self.alloc(Node::Map(out)))
    }

    /// Allocates a set, dropping duplicate elements.
    pub fn set<I: IntoIterator<Item = Value>>(&mut self, items: I) -> Value {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Node(self.alloc(Node::Set(out)))
    }

    /// Allocates a date.
    pub fn date(&mut self, millis: f64) -> Value {
        Value::Node(self.alloc(Node::Date(millis)))
    }

    /// Sets a field on an unstored object, e.g. to tie a cycle before
    /// insertion. Returns false if `target` is not an object.
    pub fn set_field(&mut self, target: NodeId, key: impl Into<Key>, value: Value) -> bool {
        let key = key.into();
        match self.node_mut(target) {
            Some(Node::Object(fields)) => {
                match fields.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => fields.push((key, value)),
                }
                true
            }
            _ => false,
        }
    }

    /// Returns true if `to` can be reached from `from` by following node
    /// references, including when they are the same node.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![from];
        while let Some(id) = pending.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            match self.node(id) {
                Some(Node::List(items) | Node::Set(items)) => {
                    pending.extend(items.iter().filter_map(Value::as_node));
                }
                Some(Node::Map(entries)) => pending.extend(
                    entries
                        .iter()
                        .flat_map(|(k, v)| [k, v])
                        .filter_map(Value::as_node),
                ),
                Some(Node::Object(fields)) => {
                    pending.extend(fields.iter().filter_map(|(_, v)| v.as_node()));
                }
                Some(Node::Date(_)) | None => {}
            }
        }
        false
    }

    /// Appends to an unstored list. Returns false if `target` is not a list.
    pub fn push(&mut self, target: NodeId, value: Value) -> bool {
        match self.node_mut(target) {
            Some(Node::List(items)) => {
                items.push(value);
                true
            }
            _ => false,
        }
    }
}

/// Deep comparison of two value graphs, possibly in different heaps.
///
/// Besides matching contents, the graphs must agree on sharing: every node
/// on the left is paired with exactly one node on the right. A pair is
/// recorded when first reached and compared later from a work list, which
/// handles cycles and keeps deep graphs off the call stack.
///
/// Lists, maps and sets compare in order; object fields compare by key.
pub fn structurally_equal(lhs_heap: &Heap, lhs: &Value, rhs_heap: &Heap, rhs: &Value) -> bool {
    let mut cmp = GraphComparison {
        lhs: lhs_heap,
        rhs: rhs_heap,
        forward: HashMap::new(),
        backward: HashMap::new(),
        pending: Vec::new(),
    };
    if !cmp.values(lhs, rhs) {
        return false;
    }
    while let Some((x, y)) = cmp.pending.pop() {
        if !cmp.nodes(x, y) {
            return false;
        }
    }
    true
}

struct GraphComparison<'a> {
    lhs: &'a Heap,
    rhs: &'a Heap,
    forward: HashMap<NodeId, NodeId>,
    backward: HashMap<NodeId, NodeId>,
    pending: Vec<(NodeId, NodeId)>,
}

impl<'a> GraphComparison<'a> {
    /// Compares scalars now; pairs up nodes and queues them.
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Node(x), Value::Node(y)) => self.pair(*x, *y),
            (Value::Node(_), _) | (_, Value::Node(_)) => false,
            _ => a == b,
        }
    }

    fn pair(&mut self, x: NodeId, y: NodeId) -> bool {
        match (self.forward.get(&x), self.backward.get(&y)) {
            (Some(mapped_x), Some(mapped_y)) => *mapped_x == y && *mapped_y == x,
            (None, None) => {
                self.forward.insert(x, y);
                self.backward.insert(y, x);
                self.pending.push((x, y));
                true
            }
            _ => false,
        }
    }

    fn nodes(&mut self, x: NodeId, y: NodeId) -> bool {
        let (lhs, rhs) = (self.lhs, self.rhs);
        let (Some(a), Some(b)) = (lhs.node(x), rhs.node(y)) else {
            return false;
        };
        match (a, b) {
            (Node::List(a), Node::List(b)) | (Node::Set(a), Node::Set(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(p, q)| self.values(p, q))
            }
            (Node::Map(a), Node::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| self.values(ka, kb) && self.values(va, vb))
            }
            (Node::Object(a), Node::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, va)| {
                        match b.iter().find(|(k, _)| k == key) {
                            Some((_, vb)) => self.values(va, vb),
                            None => false,
                        }
                    })
            }
            (Node::Date(a), Node::Date(b)) => same_value_zero(*a, *b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_dedupe_keys() {
        let mut heap = Heap::new();
        let obj = heap.object([("a", Value::from(1)), ("b", Value::from(2)), ("a", Value::from(3))]);
        let Some(Node::Object(fields)) = heap.resolve(&obj) else {
            panic!("expected object");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], (Key::from("a"), Value::from(3)));

        let set = heap.set([Value::from("x"), Value::from("x"), Value::from("y")]);
        assert_eq!(heap.resolve(&set).map(Node::len), Some(2));
    }

    #[test]
    fn equal_trees_in_different_heaps() {
        let mut left = Heap::new();
        let mut right = Heap::new();
        let l_tags = left.list([Value::from("a"), Value::from("b")]);
        let l = left.object([("tags", l_tags), ("n", Value::from(1))]);
        let r_tags = right.list([Value::from("a"), Value::from("b")]);
        let r = right.object([("n", Value::from(1)), ("tags", r_tags)]);

        assert!(structurally_equal(&left, &l, &right, &r));
    }

    #[test]
    fn sharing_must_match() {
        let mut shared = Heap::new();
        let inner = shared.list([Value::from(1)]);
        let s = shared.list([inner.clone(), inner]);

        let mut copied = Heap::new();
        let a = copied.list([Value::from(1)]);
        let b = copied.list([Value::from(1)]);
        let c = copied.list([a, b]);

        assert!(!structurally_equal(&shared, &s, &copied, &c));
        assert!(structurally_equal(&shared, &s, &shared, &s));
    }

    #[test]
    fn cycles_terminate() {
        let mut heap = Heap::new();
        let a = heap.object(Vec::<(Key, Value)>::new());
        let id = a.as_node().unwrap();
        assert!(heap.set_field(id, "self", a.clone()));

        let mut other = Heap::new();
        let b = other.object(Vec::<(Key, Value)>::new());
        other.set_field(b.as_node().unwrap(), "self", b.clone());

        assert!(structurally_equal(&heap, &a, &other, &b));
    }

    #[test]
    fn deep_lists_compare_without_recursion() {
        let mut left = Heap::new();
        let mut right = Heap::new();
        let mut l = Value::Null;
        let mut r = Value::Null;
        for i in 0..200_000 {
            l = left.list([l, Value::from(i)]);
            r = right.list([r, Value::from(i)]);
        }
        assert!(structurally_equal(&left, &l, &right, &r));

        let tail = right.list([r, Value::from(-1)]);
        let l_tail = left.list([l, Value::from(-2)]);
        assert!(!structurally_equal(&left, &l_tail, &right, &tail));
    }

    #[test]
    fn reaches_follows_references() {
        let mut heap = Heap::new();
        let leaf = heap.date(0.0);
        let key = heap.list([]);
        let map = heap.map([(key.clone(), Value::Null)]);
        let root = heap.object([("m", map), ("d", leaf.clone())]);
        let stray = heap.list([]);

        let root = root.as_node().unwrap();
        assert!(heap.reaches(root, root));
        assert!(heap.reaches(root, key.as_node().unwrap()));
        assert!(heap.reaches(root, leaf.as_node().unwrap()));
        assert!(!heap.reaches(root, stray.as_node().unwrap()));
    }

    #[test]
    fn differing_scalars_fail() {
        let mut heap = Heap::new();
        let a = heap.list([Value::from(1)]);
        let b = heap.list([Value::from(2)]);
        assert!(!structurally_equal(&heap, &a, &heap, &b));
        let d1 = heap.date(10.0);
        let d2 = heap.date(10.0);
        assert!(structurally_equal(&heap, &d1, &heap, &d2));
    }
}
