//! Hash index implementation.

use crate::types::RecordId;
use std::collections::{BTreeSet, HashMap};
use tabula_codec::Value;

/// Hash-based index for O(1) equality lookups on one column.
///
/// `HashIndex` maps a column value to the set of records currently holding
/// it. Keys use [`Value`]'s SameValueZero equality, so `NaN` finds `NaN`
/// and composites are matched by identity. Absent values (`undefined`) are
/// never indexed.
///
/// # Example
///
/// ```rust
/// use tabula_core::index::HashIndex;
/// use tabula_core::RecordId;
/// use tabula_codec::Value;
///
/// let mut index = HashIndex::new("email");
/// index.insert(&Value::from("j@x.com"), RecordId::new(1));
///
/// assert_eq!(index.lookup(&Value::from("j@x.com")), vec![RecordId::new(1)]);
/// assert!(index.lookup(&Value::from("other")).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    /// Indexed column.
    column: String,
    /// Value to record IDs mapping.
    entries: HashMap<Value, BTreeSet<RecordId>>,
    /// Total membership count.
    count: usize,
}

impl HashIndex {
    /// Creates an empty index for `column`.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            entries: HashMap::new(),
            count: 0,
        }
    }

    /// Returns the indexed column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Rebuilds the index from a set of value-record pairs.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Value, RecordId)>,
    {
        self.clear();
        for (value, record) in entries {
            self.insert(&value, record);
        }
    }

    /// Adds `record` to the bucket for `value`. Returns false if the value
    /// is absent or the record was already a member.
    pub fn insert(&mut self, value: &Value, record: RecordId) -> bool {
        if value.is_undefined() {
            return false;
        }
        let inserted = self.entries.entry(value.clone()).or_default().insert(record);
        if inserted {
            self.count += 1;
        }
        inserted
    }

    /// Removes `record` from the bucket for `value`. Empty buckets are
    /// dropped.
    pub fn remove(&mut self, value: &Value, record: RecordId) -> bool {
        if let Some(set) = self.entries.get_mut(value) {
            if set.remove(&record) {
                self.count -= 1;
                if set.is_empty() {
                    self.entries.remove(value);
                }
                return true;
            }
        }
        false
    }

    /// Records holding `value`, in ascending ID order.
    pub fn lookup(&self, value: &Value) -> Vec<RecordId> {
        match self.entries.get(value) {
            Some(set) => set.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Returns true if some record holds `value`.
    pub fn contains(&self, value: &Value) -> bool {
        self.entries.contains_key(value)
    }

    /// Iterates over the buckets, in no particular order.
    pub fn buckets(&self) -> impl Iterator<Item = (&Value, &BTreeSet<RecordId>)> {
        self.entries.iter()
    }

    /// Number of distinct indexed values.
    pub fn bucket_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of (value, record) memberships.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Removes every membership.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_codec::NodeId;

    #[test]
    fn insert_and_lookup() {
        let mut index = HashIndex::new("email");
        index.insert(&Value::from("a"), RecordId::new(2));
        index.insert(&Value::from("a"), RecordId::new(1));

        assert_eq!(
            index.lookup(&Value::from("a")),
            vec![RecordId::new(1), RecordId::new(2)]
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.bucket_count(), 1);
    }

    #[test]
    fn lookup_missing() {
        let index = HashIndex::new("email");
        assert!(index.lookup(&Value::from("missing")).is_empty());
        assert!(!index.contains(&Value::Null));
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut index = HashIndex::new("n");
        assert!(index.insert(&Value::from(1), RecordId::new(1)));
        assert!(!index.insert(&Value::from(1), RecordId::new(1)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn undefined_is_never_indexed() {
        let mut index = HashIndex::new("n");
        assert!(!index.insert(&Value::Undefined, RecordId::new(1)));
        assert!(index.is_empty());
        assert!(index.lookup(&Value::Undefined).is_empty());
    }

    #[test]
    fn null_is_indexed() {
        let mut index = HashIndex::new("n");
        assert!(index.insert(&Value::Null, RecordId::new(4)));
        assert_eq!(index.lookup(&Value::Null), vec![RecordId::new(4)]);
    }

    #[test]
    fn remove_drops_empty_bucket() {
        let mut index = HashIndex::new("n");
        index.insert(&Value::from("x"), RecordId::new(1));

        assert!(index.remove(&Value::from("x"), RecordId::new(1)));
        assert!(!index.contains(&Value::from("x")));
        assert!(!index.remove(&Value::from("x"), RecordId::new(1)));
        assert!(index.is_empty());
    }

    #[test]
    fn keys_use_same_value_zero() {
        let mut index = HashIndex::new("n");
        index.insert(&Value::Number(f64::NAN), RecordId::new(1));
        index.insert(&Value::Number(-0.0), RecordId::new(2));
        index.insert(&Value::Node(NodeId(9)), RecordId::new(3));

        assert_eq!(index.lookup(&Value::Number(f64::NAN)), vec![RecordId::new(1)]);
        assert_eq!(index.lookup(&Value::Number(0.0)), vec![RecordId::new(2)]);
        assert_eq!(index.lookup(&Value::Node(NodeId(9))), vec![RecordId::new(3)]);
        assert!(index.lookup(&Value::Node(NodeId(8))).is_empty());
    }

    #[test]
    fn rebuild_replaces_contents() {
        let mut index = HashIndex::new("n");
        index.insert(&Value::from("stale"), RecordId::new(9));
        index.rebuild(vec![
            (Value::from("a"), RecordId::new(1)),
            (Value::Undefined, RecordId::new(2)),
        ]);

        assert!(!index.contains(&Value::from("stale")));
        assert_eq!(index.len(), 1);
    }
}
