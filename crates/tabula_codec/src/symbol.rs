//! Opaque interned tokens and the name registry used to persist them.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Id 0 is reserved for [`Symbol::record_id`].
static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque token whose identity, not its description, is meaningful.
///
/// Two symbols are equal only if they were minted by the same call to
/// [`Symbol::new`] (or are both the well-known [`Symbol::record_id`]).
/// The description is informational and plays no part in equality.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    /// Mints a fresh symbol with a description.
    pub fn new(description: &str) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: Some(Arc::from(description)),
        }
    }

    /// Mints a fresh symbol without a description.
    pub fn anonymous() -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    /// The well-known token under which a record carries its identifier.
    pub fn record_id() -> Self {
        Self {
            id: 0,
            description: Some(Arc::from("recordId")),
        }
    }

    /// Returns the process-unique token id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "Symbol({d})#{}", self.id),
            None => write!(f, "Symbol()#{}", self.id),
        }
    }
}

/// Bidirectional registry between persisted names and live symbols.
///
/// The encoder looks symbols up by identity to find their name; the
/// decoder looks names up to recover the exact same token.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_name: HashMap<String, Symbol>,
    by_symbol: HashMap<Symbol, String>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `symbol` under `name`, replacing any previous binding of
    /// either side.
    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) {
        let name = name.into();
        if let Some(previous) = self.by_name.remove(&name) {
            self.by_symbol.remove(&previous);
        }
        if let Some(previous) = self.by_symbol.remove(&symbol) {
            self.by_name.remove(&previous);
        }
        self.by_symbol.insert(symbol.clone(), name.clone());
        self.by_name.insert(name, symbol);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, symbol: Symbol) -> Self {
        self.insert(name, symbol);
        self
    }

    /// Looks up the symbol registered under `name`.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name)
    }

    /// Looks up the name `symbol` is registered under.
    pub fn name_of(&self, symbol: &Symbol) -> Option<&str> {
        self.by_symbol.get(symbol).map(String::as_str)
    }

    /// Copies every binding of `other` into this table.
    pub fn merge(&mut self, other: &SymbolTable) {
        for (name, symbol) in &other.by_name {
            self.insert(name.clone(), symbol.clone());
        }
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if no symbol is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates over `(name, symbol)` bindings in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.by_name.iter().map(|(n, s)| (n.as_str(), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_compare_by_identity() {
        let a = Symbol::new("tag");
        let b = Symbol::new("tag");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(Symbol::record_id(), Symbol::record_id());
    }

    #[test]
    fn table_lookups_both_ways() {
        let sym = Symbol::new("color");
        let table = SymbolTable::new().with("color", sym.clone());

        assert_eq!(table.symbol("color"), Some(&sym));
        assert_eq!(table.name_of(&sym), Some("color"));
        assert_eq!(table.name_of(&Symbol::anonymous()), None);
    }

    #[test]
    fn rebinding_replaces_stale_entries() {
        let first = Symbol::new("a");
        let second = Symbol::new("b");
        let mut table = SymbolTable::new();
        table.insert("name", first.clone());
        table.insert("name", second.clone());

        assert_eq!(table.len(), 1);
        assert_eq!(table.name_of(&first), None);
        assert_eq!(table.symbol("name"), Some(&second));

        table.insert("other", second.clone());
        assert_eq!(table.symbol("name"), None);
        assert_eq!(table.name_of(&second), Some("other"));
    }
}
