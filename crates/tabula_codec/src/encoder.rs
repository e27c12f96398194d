//! CBOR encoder for the wire form.

use crate::wire::{
    WireKey, WireValue, TAG_BIGINT, TAG_DATE, TAG_MAP, TAG_OBJECT, TAG_REF, TAG_SET, TAG_SYMBOL,
};

/// Encode a wire value to CBOR bytes.
///
/// Integer heads always use the shortest form, lengths are always
/// definite, and numbers are written as double-precision floats.
pub fn to_bytes(value: &WireValue) -> Vec<u8> {
    let mut encoder = WireEncoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// Work item of [`WireEncoder::encode`].
enum Pending<'v> {
    Value(&'v WireValue),
    Key(&'v WireKey),
}

/// A CBOR encoder for [`WireValue`]s.
pub struct WireEncoder {
    buffer: Vec<u8>,
}

impl WireEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    ///
    /// Containers are written from an explicit work list, so nesting depth
    /// is bounded by memory rather than by the call stack.
    pub fn encode(&mut self, value: &WireValue) {
        let mut pending = vec![Pending::Value(value)];
        while let Some(next) = pending.pop() {
            match next {
                Pending::Key(WireKey::Name(name)) => self.encode_text(name),
                Pending::Key(WireKey::Symbol(name)) => self.encode_symbol(name),
                Pending::Value(value) => self.encode_head(value, &mut pending),
            }
        }
    }

    /// Writes a value's own bytes and queues its children in order.
    fn encode_head<'v>(&mut self, value: &'v WireValue, pending: &mut Vec<Pending<'v>>) {
        match value {
            // CBOR undefined is simple value 23 (0xf7), null is 22 (0xf6)
            WireValue::Absent => self.buffer.push(0xf7),
            WireValue::Null => self.buffer.push(0xf6),
            WireValue::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            WireValue::Number(n) => self.encode_float(*n),
            WireValue::Text(s) => self.encode_text(s),
            WireValue::BigInt(digits) => {
                self.encode_tag(TAG_BIGINT);
                self.encode_text(digits);
            }
            WireValue::Symbol(name) => self.encode_symbol(name),
            WireValue::Date(millis) => {
                self.encode_tag(TAG_DATE);
                self.encode_float(*millis);
            }
            WireValue::List(items) => {
                self.encode_unsigned(4, items.len() as u64);
                pending.extend(items.iter().rev().map(Pending::Value));
            }
            WireValue::Map(entries) => {
                self.encode_tag(TAG_MAP);
                self.encode_unsigned(4, entries.len() as u64 * 2);
                for (key, value) in entries.iter().rev() {
                    pending.push(Pending::Value(value));
                    pending.push(Pending::Value(key));
                }
            }
            WireValue::Set(items) => {
                self.encode_tag(TAG_SET);
                self.encode_unsigned(4, items.len() as u64);
                pending.extend(items.iter().rev().map(Pending::Value));
            }
            WireValue::Object(fields) => {
                self.encode_tag(TAG_OBJECT);
                self.encode_unsigned(4, fields.len() as u64 * 2);
                for (key, value) in fields.iter().rev() {
                    pending.push(Pending::Value(value));
                    pending.push(Pending::Key(key));
                }
            }
            WireValue::Ref(id) => {
                self.encode_tag(TAG_REF);
                self.encode_unsigned(0, u64::from(*id));
            }
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_tag(&mut self, tag: u64) {
        self.encode_unsigned(6, tag);
    }

    fn encode_float(&mut self, n: f64) {
        // Double-precision float is major type 7, additional info 27
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&n.to_be_bytes());
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_symbol(&mut self, name: &str) {
        self.encode_tag(TAG_SYMBOL);
        self.encode_text(name);
    }
}

impl Default for WireEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple_values() {
        assert_eq!(to_bytes(&WireValue::Absent), vec![0xf7]);
        assert_eq!(to_bytes(&WireValue::Null), vec![0xf6]);
        assert_eq!(to_bytes(&WireValue::Bool(false)), vec![0xf4]);
        assert_eq!(to_bytes(&WireValue::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn encode_number_as_double() {
        assert_eq!(
            to_bytes(&WireValue::Number(1.5)),
            vec![0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn encode_text() {
        assert_eq!(to_bytes(&WireValue::Text(String::new())), vec![0x60]);
        assert_eq!(
            to_bytes(&WireValue::Text("hello".to_string())),
            vec![0x65, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn encode_list() {
        assert_eq!(to_bytes(&WireValue::List(vec![])), vec![0x80]);
        assert_eq!(
            to_bytes(&WireValue::List(vec![WireValue::Null, WireValue::Bool(true)])),
            vec![0x82, 0xf6, 0xf5]
        );
    }

    #[test]
    fn encode_reference_uses_shared_ref_tag() {
        // tag 29 = 0xd8 0x1d, then unsigned 5
        assert_eq!(to_bytes(&WireValue::Ref(5)), vec![0xd8, 0x1d, 0x05]);
        // ids past 23 take a longer head
        assert_eq!(to_bytes(&WireValue::Ref(300)), vec![0xd8, 0x1d, 0x19, 0x01, 0x2c]);
    }

    #[test]
    fn encode_object_keeps_insertion_order() {
        let object = WireValue::Object(vec![
            (WireKey::Name("z".into()), WireValue::Null),
            (WireKey::Name("a".into()), WireValue::Null),
        ]);
        let bytes = to_bytes(&object);
        // tag 55002 (0xd9 0xd6 0xda), array(4), "z", null, "a", null
        assert_eq!(
            bytes,
            vec![0xd9, 0xd6, 0xda, 0x84, 0x61, b'z', 0xf6, 0x61, b'a', 0xf6]
        );
    }

    #[test]
    fn encode_bigint_as_tagged_text() {
        let bytes = to_bytes(&WireValue::BigInt("-12".into()));
        assert_eq!(bytes, vec![0xd9, 0xd6, 0xd9, 0x63, b'-', b'1', b'2']);
    }

    #[test]
    fn encode_map_interleaves_keys_and_values() {
        let map = WireValue::Map(vec![
            (WireValue::Text("a".into()), WireValue::Bool(true)),
            (WireValue::Null, WireValue::List(vec![WireValue::Absent])),
        ]);
        // tag 259 (0xd9 0x01 0x03), array(4), "a", true, null, [undefined]
        assert_eq!(
            to_bytes(&map),
            vec![0xd9, 0x01, 0x03, 0x84, 0x61, b'a', 0xf5, 0xf6, 0x81, 0xf7]
        );
    }

    #[test]
    fn encode_deeply_nested_lists() {
        let depth = 100_000;
        let mut value = WireValue::Null;
        for _ in 0..depth {
            value = WireValue::List(vec![value]);
        }
        let bytes = to_bytes(&value);
        assert_eq!(bytes.len(), depth + 1);
        assert!(bytes[..depth].iter().all(|b| *b == 0x81));
        assert_eq!(bytes[depth], 0xf6);
    }
}
