//! The reference-indexed wire form of a value graph.

/// CBOR tag for dates (epoch-based date/time).
pub const TAG_DATE: u64 = 1;
/// CBOR tag for a reference to a previously encoded composite.
pub const TAG_REF: u64 = 29;
/// CBOR tag for identifiers, used for symbol names.
pub const TAG_SYMBOL: u64 = 39;
/// CBOR tag for finite sets.
pub const TAG_SET: u64 = 258;
/// CBOR tag for maps with arbitrary keys.
pub const TAG_MAP: u64 = 259;
/// Private tag: arbitrary-precision integer as canonical decimal text.
pub const TAG_BIGINT: u64 = 55_001;
/// Private tag: plain object as a flat key/value array.
pub const TAG_OBJECT: u64 = 55_002;

/// An encoded value graph.
///
/// Every composite (list, map, set, object, date) is implicitly numbered in
/// pre-order as it is encountered; a later occurrence of the same node is
/// written as [`WireValue::Ref`] carrying that number. Map and object
/// entries keep insertion order so the numbering is reproducible by the
/// decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Absent value.
    Absent,
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Double-precision number.
    Number(f64),
    /// Text string.
    Text(String),
    /// Arbitrary-precision integer, canonical decimal form.
    BigInt(String),
    /// Symbol, by registered or placeholder name.
    Symbol(String),
    /// Date, milliseconds since the Unix epoch.
    Date(f64),
    /// Ordered list.
    List(Vec<WireValue>),
    /// Unique-key associative container.
    Map(Vec<(WireValue, WireValue)>),
    /// Unique-element container.
    Set(Vec<WireValue>),
    /// Plain keyed object.
    Object(Vec<(WireKey, WireValue)>),
    /// Back-reference to the composite with this pre-order id.
    Ref(u32),
}

/// An encoded object field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireKey {
    /// String field name.
    Name(String),
    /// Symbol field, by registered or placeholder name.
    Symbol(String),
}

impl WireValue {
    /// Returns true for kinds that take a reference id.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            WireValue::Date(_)
                | WireValue::List(_)
                | WireValue::Map(_)
                | WireValue::Set(_)
                | WireValue::Object(_)
        )
    }

    /// Short name of the kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            WireValue::Absent => "absent",
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::Number(_) => "number",
            WireValue::Text(_) => "text",
            WireValue::BigInt(_) => "bigint",
            WireValue::Symbol(_) => "symbol",
            WireValue::Date(_) => "date",
            WireValue::List(_) => "list",
            WireValue::Map(_) => "map",
            WireValue::Set(_) => "set",
            WireValue::Object(_) => "object",
            WireValue::Ref(_) => "reference",
        }
    }

    /// Moves this value's children onto `out`, leaving it empty.
    fn drain_children(&mut self, out: &mut Vec<WireValue>) {
        match self {
            WireValue::List(items) | WireValue::Set(items) => out.append(items),
            WireValue::Map(entries) => {
                for (key, value) in entries.drain(..) {
                    out.push(key);
                    out.push(value);
                }
            }
            WireValue::Object(fields) => out.extend(fields.drain(..).map(|(_, value)| value)),
            _ => {}
        }
    }

    /// Looks up a string-named field of an object.
    pub fn field(&self, name: &str) -> Option<&WireValue> {
        match self {
            WireValue::Object(fields) => fields
                .iter()
                .find(|(k, _)| matches!(k, WireKey::Name(n) if n == name))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

// Nesting depth is unbounded, so children are released from a work list
// instead of by recursive drop glue.
impl Drop for WireValue {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.drain_children(&mut pending);
        while let Some(mut value) = pending.pop() {
            value.drain_children(&mut pending);
        }
    }
}
