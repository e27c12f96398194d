//! Secondary indices.
//!
//! Indices are caches over a table's records, never the source of truth.
//! Every index is:
//! - Maintained in the same step as the field mutation it reflects
//! - Rebuildable from a full table scan
//! - Checkable against the records with [`Store::verify_indices`](crate::Store::verify_indices)
//!
//! Only exact-match lookup is supported, through [`HashIndex`].

mod hash;

pub use hash::HashIndex;

use crate::types::RecordId;
use std::fmt;
use tabula_codec::Value;

/// A disagreement between an index and the records it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMismatch {
    /// Table of the index.
    pub table: String,
    /// Indexed column.
    pub column: String,
    /// Record involved.
    pub record: RecordId,
    /// What is wrong.
    pub kind: MismatchKind,
}

/// How an index disagrees with a record.
#[derive(Debug, Clone, PartialEq)]
pub enum MismatchKind {
    /// The record holds `value` but is not in its bucket.
    Missing {
        /// The record's current column value.
        value: Value,
    },
    /// The record sits in the bucket for `value` without holding it.
    Stale {
        /// The bucket's value.
        value: Value,
    },
}

impl fmt::Display for IndexMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MismatchKind::Missing { value } => write!(
                f,
                "{}.{}: {} holds {:?} but is not indexed under it",
                self.table, self.column, self.record, value
            ),
            MismatchKind::Stale { value } => write!(
                f,
                "{}.{}: {} is indexed under {:?} but does not hold it",
                self.table, self.column, self.record, value
            ),
        }
    }
}
