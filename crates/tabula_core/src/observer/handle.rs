//! Handles and the identity-keyed handle cache.

use crate::types::RecordId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tabula_codec::{NodeId, Value};

/// Where a mutation through a handle is attributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribution {
    /// Owning table.
    pub table: Arc<str>,
    /// Owning record.
    pub record: RecordId,
    /// Top-level column the value hangs off, `None` for the record root.
    pub column: Option<Arc<str>>,
}

/// A stable reference to a stored composite value.
///
/// Handles are cheap to clone and carry no borrow of the store; pass one
/// to [`Store::observe`](crate::Store::observe) to read or mutate the
/// value it points at. Wrapping the same node twice yields equal handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    node: NodeId,
    origin: Attribution,
}

/// Handle of a record root.
pub type RecordHandle = Handle;

impl Handle {
    pub(crate) fn new(node: NodeId, origin: Attribution) -> Self {
        Self { node, origin }
    }

    /// The node this handle points at.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Identifier of the owning record.
    pub fn id(&self) -> RecordId {
        self.origin.record
    }

    /// Name of the owning table.
    pub fn table(&self) -> &str {
        &self.origin.table
    }

    /// Top-level column, `None` for a record root.
    pub fn column(&self) -> Option<&str> {
        self.origin.column.as_deref()
    }

    /// Full attribution.
    pub fn origin(&self) -> &Attribution {
        &self.origin
    }

    /// The raw value this handle wraps.
    pub fn value(&self) -> Value {
        Value::Node(self.node)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin.table, self.origin.record)?;
        if let Some(column) = &self.origin.column {
            write!(f, ".{column}")?;
        }
        write!(f, " {}", self.node)
    }
}

/// Result of reading through a handle: scalars come back as values,
/// composites come back wrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    /// A scalar.
    Value(Value),
    /// A wrapped composite.
    Handle(Handle),
}

impl Observed {
    /// The scalar, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Observed::Value(v) => Some(v),
            Observed::Handle(_) => None,
        }
    }

    /// The handle, if this is a composite.
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Observed::Handle(h) => Some(h),
            Observed::Value(_) => None,
        }
    }

    /// Consumes into the handle, if this is a composite.
    pub fn into_handle(self) -> Option<Handle> {
        match self {
            Observed::Handle(h) => Some(h),
            Observed::Value(_) => None,
        }
    }

    /// The underlying value, unwrapping composites to their node reference.
    pub fn raw(&self) -> Value {
        match self {
            Observed::Value(v) => v.clone(),
            Observed::Handle(h) => h.value(),
        }
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        observed.raw()
    }
}

/// Node id to handle, scoped to one store.
#[derive(Debug, Default)]
pub(crate) struct HandleCache {
    entries: HashMap<NodeId, Handle>,
}

impl HandleCache {
    /// Returns the cached handle for `node`, creating it with `origin` on
    /// first sight.
    pub(crate) fn wrap(&mut self, node: NodeId, origin: impl FnOnce() -> Attribution) -> Handle {
        self.entries
            .entry(node)
            .or_insert_with(|| Handle::new(node, origin()))
            .clone()
    }

    /// Returns the root handle of a record, replacing any entry that was
    /// created with a different attribution.
    pub(crate) fn root(&mut self, node: NodeId, table: Arc<str>, record: RecordId) -> Handle {
        let origin = Attribution {
            table,
            record,
            column: None,
        };
        match self.entries.get(&node) {
            Some(existing) if existing.origin == origin => existing.clone(),
            _ => {
                let handle = Handle::new(node, origin);
                self.entries.insert(node, handle.clone());
                handle
            }
        }
    }

    /// The cached handle for `node`, if any.
    pub(crate) fn get(&self, node: NodeId) -> Option<&Handle> {
        self.entries.get(&node)
    }

    /// Drops every handle attributed to `record`.
    pub(crate) fn evict_record(&mut self, table: &str, record: RecordId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, h| !(h.origin.record == record && &*h.origin.table == table));
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(record: u64, column: Option<&str>) -> Attribution {
        Attribution {
            table: Arc::from("users"),
            record: RecordId::new(record),
            column: column.map(Arc::from),
        }
    }

    #[test]
    fn wrap_is_identity_stable() {
        let mut cache = HandleCache::default();
        let a = cache.wrap(NodeId(4), || origin(1, Some("tags")));
        let b = cache.wrap(NodeId(4), || origin(2, Some("other")));
        assert_eq!(a, b);
        assert_eq!(b.column(), Some("tags"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn root_overrides_child_attribution() {
        let mut cache = HandleCache::default();
        cache.wrap(NodeId(4), || origin(1, Some("friend")));
        let root = cache.root(NodeId(4), Arc::from("users"), RecordId::new(2));
        assert_eq!(root.id(), RecordId::new(2));
        assert_eq!(root.column(), None);
        assert_eq!(cache.wrap(NodeId(4), || origin(9, None)), root);
    }

    #[test]
    fn evict_is_per_record() {
        let mut cache = HandleCache::default();
        cache.wrap(NodeId(1), || origin(1, None));
        cache.wrap(NodeId(2), || origin(1, Some("tags")));
        cache.wrap(NodeId(3), || origin(2, None));

        assert_eq!(cache.evict_record("users", RecordId::new(1)), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict_record("posts", RecordId::new(2)), 0);
    }

    #[test]
    fn display_shows_attribution() {
        let handle = Handle::new(NodeId(7), origin(3, Some("tags")));
        assert_eq!(handle.to_string(), "users/rec:3.tags #7");
    }

    #[test]
    fn observed_raw() {
        let handle = Handle::new(NodeId(7), origin(3, None));
        assert_eq!(Observed::Handle(handle).raw(), Value::Node(NodeId(7)));
        assert_eq!(Value::from(Observed::Value(Value::Null)), Value::Null);
    }
}
