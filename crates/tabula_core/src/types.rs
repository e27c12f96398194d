//! Core type definitions for tabula.

use std::fmt;

/// Unique identifier of a record within its table.
///
/// Record IDs are assigned monotonically at insertion and never reused,
/// even after the record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Creates a new record ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next record ID, or `None` once the ID space is spent.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec:{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_ordering() {
        let r1 = RecordId::new(1);
        let r2 = r1.next().unwrap();
        assert!(r1 < r2);
        assert_eq!(r2.as_u64(), 2);
    }

    #[test]
    fn record_id_space_ends() {
        assert_eq!(RecordId::new(u64::MAX).next(), None);
        assert_eq!(RecordId::new(u64::MAX - 1).next(), Some(RecordId::new(u64::MAX)));
    }

    #[test]
    fn record_id_display() {
        assert_eq!(format!("{}", RecordId::new(42)), "rec:42");
    }
}
