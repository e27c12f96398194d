//! Verify command implementation.

use super::open_snapshot;
use std::path::Path;
use tabula_core::{IndexMismatch, Store};

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of tables checked.
    pub tables_checked: usize,
    /// Number of indices checked.
    pub indices_checked: usize,
    /// Number of records checked.
    pub records_checked: usize,
    /// Every disagreement between an index and its records.
    pub mismatches: Vec<IndexMismatch>,
}

impl VerifyResult {
    /// Returns true if no mismatch was found.
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Checks every index of `store`.
pub fn verify(store: &Store) -> VerifyResult {
    VerifyResult {
        tables_checked: store.tables().count(),
        indices_checked: store.tables().map(|t| t.indexed_columns().count()).sum(),
        records_checked: store.tables().map(|t| t.len()).sum(),
        mismatches: store.verify_indices(),
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying snapshot at {:?}", path);
    println!();

    let store = open_snapshot(path)?;
    let result = verify(&store);
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Snapshot verification passed");
        Ok(())
    } else {
        println!("✗ Snapshot verification failed");
        Err("Verification failed".into())
    }
}

fn print_result(result: &VerifyResult) {
    println!(
        "  tables: {}, indices: {}, records: {}, mismatches: {}",
        result.tables_checked,
        result.indices_checked,
        result.records_checked,
        result.mismatches.len()
    );
    for mismatch in &result.mismatches {
        println!("    ERROR: {}", mismatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_testkit::prelude::*;

    #[test]
    fn consistent_snapshot_passes() {
        let (store, _) = scenarios::friend_ring(4);
        let snapshot = TempSnapshot::write(&store);
        assert!(run(snapshot.path()).is_ok());

        let result = verify(&snapshot.load(Default::default()));
        assert_eq!(result.tables_checked, 1);
        assert_eq!(result.indices_checked, 1);
        assert_eq!(result.records_checked, 4);
    }

    #[test]
    fn out_of_band_edit_is_reported() {
        let mut store = users_store();
        let user = add_user(&mut store, "John", "j@x.com");
        // Writing through the heap bypasses index maintenance.
        store
            .heap_mut()
            .set_field(user.node(), "email", tabula_codec::Value::from("other"));

        let result = verify(&store);
        assert!(!result.is_ok());
        assert_eq!(result.mismatches.len(), 2);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tabula");
        std::fs::write(&path, b"not a snapshot").unwrap();
        assert!(run(&path).is_err());
    }
}
