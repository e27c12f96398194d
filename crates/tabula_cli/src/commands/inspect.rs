//! Inspect command implementation.

use super::open_snapshot;
use crate::Format;
use serde::Serialize;
use std::path::Path;
use tabula_core::Store;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Number of heap nodes after load.
    pub nodes: usize,
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of records.
    pub record_count: usize,
    /// Last assigned identifier.
    pub last_id: u64,
    /// Indexed columns with their bucket counts.
    pub indices: Vec<IndexStats>,
}

/// Statistics for a single index.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    /// Indexed column.
    pub column: String,
    /// Number of distinct values.
    pub buckets: usize,
    /// Number of indexed records.
    pub entries: usize,
}

/// Collects statistics for a loaded store.
pub fn inspect(path: &Path, size: u64, store: &Store) -> InspectResult {
    let tables = store
        .tables()
        .map(|table| TableStats {
            name: table.name().to_string(),
            record_count: table.len(),
            last_id: table.last_id().as_u64(),
            indices: table
                .indexed_columns()
                .filter_map(|column| table.index(column))
                .map(|index| IndexStats {
                    column: index.column().to_string(),
                    buckets: index.bucket_count(),
                    entries: index.len(),
                })
                .collect(),
        })
        .collect();

    InspectResult {
        path: path.display().to_string(),
        size,
        nodes: store.heap().len(),
        tables,
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_snapshot(path)?;
    let size = std::fs::metadata(path)?.len();
    let result = inspect(path, size, &store);

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("tabula Snapshot Inspection");
    println!("==========================");
    println!();
    println!("Path:  {}", result.path);
    println!("Size:  {}", format_size(result.size));
    println!("Nodes: {}", result.nodes);
    println!();
    println!("Tables ({}):", result.tables.len());
    for table in &result.tables {
        println!(
            "  {} - {} records, last id {}",
            table.name, table.record_count, table.last_id
        );
        for index in &table.indices {
            println!(
                "    index {}: {} values, {} entries",
                index.column, index.buckets, index.entries
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_testkit::prelude::*;

    #[test]
    fn inspect_reports_tables_and_indices() {
        let (store, _) = scenarios::populated_users(6);
        let snapshot = TempSnapshot::write(&store);
        let loaded = open_snapshot(snapshot.path()).unwrap();
        let result = inspect(snapshot.path(), 0, &loaded);

        assert_eq!(result.tables.len(), 1);
        let users = &result.tables[0];
        assert_eq!(users.name, USERS);
        assert_eq!(users.record_count, 6);
        assert_eq!(users.last_id, 6);
        assert_eq!(users.indices.len(), 1);
        assert_eq!(users.indices[0].column, "email");
        assert_eq!(users.indices[0].entries, 6);
        assert_eq!(users.indices[0].buckets, 5);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["tables"][0]["record_count"], 6);
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("nope.tabula"), Format::Text).is_err());
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
