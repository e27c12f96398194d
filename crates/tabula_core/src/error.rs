//! Error types for tabula core.

use crate::types::RecordId;
use tabula_codec::{CodecError, NodeId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// Misses on named entities (tables, records, indices) and misuse of a
/// handle are *non-fatal*: the operation is a no-op and the error is
/// reported. Transaction misuse and snapshot decoding problems are
/// *fatal* to the operation. See [`StoreError::is_fatal`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table not found.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Name of the table.
        table: String,
    },

    /// Record not found.
    #[error("record not found: {id} in table {table}")]
    RecordNotFound {
        /// The table searched.
        table: String,
        /// The record ID that was not found.
        id: RecordId,
    },

    /// Every identifier of the table has been assigned.
    #[error("record identifiers exhausted in table {table}")]
    IdsExhausted {
        /// Name of the table.
        table: String,
    },

    /// An index on this column already exists.
    #[error("index already exists on {table}.{column}")]
    IndexAlreadyExists {
        /// Name of the table.
        table: String,
        /// Indexed column.
        column: String,
    },

    /// No index on this column.
    #[error("index not found on {table}.{column}")]
    IndexNotFound {
        /// Name of the table.
        table: String,
        /// Column that has no index.
        column: String,
    },

    /// Commit or rollback with no open transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A container operation was invoked on a value of another kind.
    #[error("invalid mutation target: expected {expected}, found {found}")]
    InvalidMutationTarget {
        /// Kind the operation needs.
        expected: &'static str,
        /// Kind actually found.
        found: String,
    },

    /// List position outside the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// Requested position.
        index: usize,
        /// Current list length.
        len: usize,
    },

    /// The value cannot be stored as a record.
    #[error("invalid record for table {table}: {message}")]
    InvalidRecord {
        /// Target table.
        table: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The record identifier field cannot be written through a handle.
    #[error("key {key} is reserved")]
    ReservedKey {
        /// The reserved key.
        key: String,
    },

    /// A value references a node that does not exist in the store's heap.
    #[error("unknown node {node}")]
    UnknownNode {
        /// The dangling node id.
        node: NodeId,
    },

    /// Snapshot bytes decode but do not describe a store.
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Description of the problem.
        message: String,
    },

    /// Wire codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Creates a table not found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Creates an invalid mutation target error.
    pub fn invalid_target(expected: &'static str, found: impl ToString) -> Self {
        Self::InvalidMutationTarget {
            expected,
            found: found.to_string(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Returns true if continuing after this error could corrupt state.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoActiveTransaction | Self::InvalidSnapshot { .. } | Self::Codec(_)
        )
    }

    /// Logs a non-fatal error and hands it back for propagation.
    pub(crate) fn reported(self) -> Self {
        if !self.is_fatal() {
            tracing::warn!(error = %self, "store operation rejected");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_follows_policy() {
        assert!(!StoreError::table_not_found("users").is_fatal());
        assert!(!StoreError::RecordNotFound {
            table: "users".into(),
            id: RecordId::new(3),
        }
        .is_fatal());
        assert!(StoreError::NoActiveTransaction.is_fatal());
        assert!(StoreError::from(CodecError::DecodeReferenceMissing { id: 1 }).is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let err = StoreError::IndexAlreadyExists {
            table: "users".into(),
            column: "email".into(),
        };
        assert_eq!(err.to_string(), "index already exists on users.email");

        let err = StoreError::RecordNotFound {
            table: "users".into(),
            id: RecordId::new(7),
        };
        assert_eq!(err.to_string(), "record not found: rec:7 in table users");
    }
}
