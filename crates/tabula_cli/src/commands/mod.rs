//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use std::path::Path;
use tabula_core::{Store, StoreConfig};

/// Reads and loads a snapshot file.
pub fn open_snapshot(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }
    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "snapshot read");
    Ok(Store::from_snapshot(&bytes, StoreConfig::default())?)
}
