//! Dynamic value type.

use crate::symbol::Symbol;
use num_bigint::BigInt;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a composite node inside a [`Heap`](crate::Heap).
///
/// Node ids are the identity of composite values: two `Value::Node`s are
/// the same value exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the arena slot as a `usize`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stored value.
///
/// Scalars are held inline; composites (lists, maps, sets, objects and
/// dates) live in a [`Heap`](crate::Heap) and are referenced by
/// [`NodeId`], which lets graphs share substructure and contain cycles.
///
/// Equality and hashing follow SameValueZero: `NaN` equals `NaN`, `+0`
/// equals `-0`, and composites compare by identity. Use
/// [`structurally_equal`](crate::structurally_equal) for deep comparison.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value.
    Undefined,
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Double-precision number.
    Number(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Arbitrary-precision integer.
    BigInt(BigInt),
    /// Opaque interned token.
    Symbol(Symbol),
    /// Reference to a composite node.
    Node(NodeId),
}

impl Value {
    /// Check if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a bigint, if it is one.
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::BigInt(n) => Some(n),
            _ => None,
        }
    }

    /// Get this value as a symbol, if it is one.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get the node this value references, if it is composite.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Symbol(_) => "symbol",
            Value::Node(_) => "composite",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_value_zero(*a, *b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => number_hash_bits(*n).hash(state),
            Value::Text(s) => s.hash(state),
            Value::BigInt(n) => n.hash(state),
            Value::Symbol(s) => s.hash(state),
            Value::Node(id) => id.hash(state),
        }
    }
}

pub(crate) fn same_value_zero(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn number_hash_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// An object field name: either a string or a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// String-named field.
    Name(String),
    /// Symbol-keyed field.
    Symbol(Symbol),
}

impl Key {
    /// Returns the field name if this is a string key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(n) => Some(n),
            Key::Symbol(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(n) => f.write_str(n),
            Key::Symbol(s) => write!(f, "[{s:?}]"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<Symbol> for Key {
    fn from(s: Symbol) -> Self {
        Key::Symbol(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn numbers_use_same_value_zero() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_ne!(Value::Number(1.0), Value::Number(2.0));

        let mut set = HashSet::new();
        set.insert(Value::Number(-0.0));
        assert!(set.contains(&Value::Number(0.0)));
        set.insert(Value::Number(f64::NAN));
        assert!(set.contains(&Value::Number(f64::NAN)));
    }

    #[test]
    fn composites_compare_by_identity() {
        assert_eq!(Value::Node(NodeId(3)), Value::Node(NodeId(3)));
        assert_ne!(Value::Node(NodeId(3)), Value::Node(NodeId(4)));
    }

    #[test]
    fn kinds_never_cross_compare() {
        assert_ne!(Value::Undefined, Value::Null);
        assert_ne!(Value::Text("1".into()), Value::Number(1.0));
        assert_ne!(Value::BigInt(BigInt::from(1)), Value::Number(1.0));
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::Undefined.is_undefined());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Number(4.5).as_number(), Some(4.5));
        assert_eq!(Value::from("hi").as_text(), Some("hi"));
        assert_eq!(Value::Node(NodeId(7)).as_node(), Some(NodeId(7)));
        assert_eq!(Value::Text("x".into()).as_node(), None);
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Number(42.0));
        assert_eq!(Value::from(42u32), Value::Number(42.0));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(()), Value::Null);
        assert_eq!(Key::from("name"), Key::Name("name".into()));
    }
}
