//! Store configuration.

use tabula_codec::{Symbol, SymbolTable};

/// Name under which the record identifier symbol is persisted.
pub const RECORD_ID_SYMBOL_NAME: &str = "tabula:record_id";

/// Snapshot format version written by this build.
pub const FORMAT_VERSION: u16 = 1;

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Snapshot format version written on serialize and required on load.
    pub format_version: u16,

    /// Caller symbols that must keep their identity across serialize/load.
    pub symbols: SymbolTable,

    /// Number of events each feed keeps for polling.
    pub max_feed_history: usize,

    /// Whether to emit a trace line per dispatched change.
    pub trace_changes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            symbols: SymbolTable::new(),
            max_feed_history: 1024,
            trace_changes: false,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot format version.
    #[must_use]
    pub const fn format_version(mut self, version: u16) -> Self {
        self.format_version = version;
        self
    }

    /// Registers a caller symbol for snapshots.
    #[must_use]
    pub fn symbol(mut self, name: impl Into<String>, symbol: Symbol) -> Self {
        self.symbols.insert(name, symbol);
        self
    }

    /// Sets the feed history bound.
    #[must_use]
    pub const fn max_feed_history(mut self, len: usize) -> Self {
        self.max_feed_history = len;
        self
    }

    /// Sets whether each change is traced.
    #[must_use]
    pub const fn trace_changes(mut self, value: bool) -> Self {
        self.trace_changes = value;
        self
    }

    /// The symbol table used for snapshots: caller symbols plus the
    /// well-known record identifier entry.
    pub fn snapshot_symbols(&self) -> SymbolTable {
        let mut table = self.symbols.clone();
        table.insert(RECORD_ID_SYMBOL_NAME, Symbol::record_id());
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.format_version, FORMAT_VERSION);
        assert!(config.symbols.is_empty());
        assert!(!config.trace_changes);
    }

    #[test]
    fn builder_pattern() {
        let tag = Symbol::new("tag");
        let config = StoreConfig::new()
            .max_feed_history(8)
            .trace_changes(true)
            .symbol("app:tag", tag.clone());

        assert_eq!(config.max_feed_history, 8);
        assert!(config.trace_changes);
        assert_eq!(config.symbols.symbol("app:tag"), Some(&tag));
    }

    #[test]
    fn snapshot_symbols_include_record_id() {
        let symbols = StoreConfig::default().snapshot_symbols();
        assert_eq!(
            symbols.symbol(RECORD_ID_SYMBOL_NAME),
            Some(&Symbol::record_id())
        );
    }
}
