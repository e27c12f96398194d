//! CBOR decoder for the wire form.

use crate::error::{CodecError, CodecResult};
use crate::wire::{
    WireKey, WireValue, TAG_BIGINT, TAG_DATE, TAG_MAP, TAG_OBJECT, TAG_REF, TAG_SET, TAG_SYMBOL,
};

/// Decode a wire value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, use a kind the wire
/// form does not define, or continue past the top-level item.
pub fn from_bytes(bytes: &[u8]) -> CodecResult<WireValue> {
    let mut decoder = WireDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A CBOR decoder for [`WireValue`]s.
///
/// The decoder insists on the shortest-form heads the encoder produces and
/// rejects indefinite-length items.
pub struct WireDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays.
/// This prevents allocation-based DoS from untrusted input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> WireDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    ///
    /// Open containers are kept on an explicit stack, so input nesting is
    /// bounded by memory rather than by the call stack.
    pub fn decode(&mut self) -> CodecResult<WireValue> {
        let mut open: Vec<Partial> = Vec::new();
        loop {
            let mut value = match self.decode_item()? {
                Item::Value(value) => value,
                Item::Open(partial) if partial.is_complete() => partial.finish(),
                Item::Open(partial) => {
                    open.push(partial);
                    continue;
                }
            };
            // Hand the finished value to its parent, closing every container
            // it completes.
            loop {
                let Some(mut parent) = open.pop() else {
                    return Ok(value);
                };
                parent.push(value)?;
                if !parent.is_complete() {
                    open.push(parent);
                    break;
                }
                value = parent.finish();
            }
        }
    }

    /// Reads one item head. Scalars come back whole; containers come back
    /// empty with the number of children still to read.
    #[allow(clippy::cast_precision_loss)]
    fn decode_item(&mut self) -> CodecResult<Item> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            // Integers are accepted as numbers even though the encoder
            // never writes them.
            0 => self
                .decode_unsigned(additional_info)
                .map(|n| Item::Value(WireValue::Number(n as f64))),
            1 => self
                .decode_unsigned(additional_info)
                .map(|n| Item::Value(WireValue::Number(-1.0 - n as f64))),
            2 => Err(CodecError::unknown_kind("byte string")),
            3 => self
                .decode_text(additional_info)
                .map(|text| Item::Value(WireValue::Text(text))),
            4 => {
                let len = self.decode_children(additional_info)?;
                Ok(Item::Open(Partial::new(Shape::List, len)))
            }
            5 => Err(CodecError::unknown_kind("untagged map")),
            6 => {
                let tag = self.decode_unsigned(additional_info)?;
                self.decode_tagged(tag)
            }
            7 => self.decode_simple(additional_info).map(Item::Value),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    #[inline]
    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let value = u64::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                if u32::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(value)
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            _ => Err(CodecError::invalid_structure(
                "indefinite-length items are forbidden",
            )),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        let len = self.decode_unsigned(additional_info)?;
        if len > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: max,
            });
        }
        usize::try_from(len).map_err(|_| CodecError::SizeLimitExceeded {
            claimed: len,
            max_allowed: max,
        })
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    /// Reads a container length. Every child takes at least one byte, so
    /// a length past the end of the input is rejected before allocating.
    fn decode_children(&mut self, additional_info: u8) -> CodecResult<usize> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        if len > self.remaining().len() {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(len)
    }

    /// Reads the header of the array that must follow a tag.
    fn expect_array_head(&mut self, tag: u64) -> CodecResult<usize> {
        let byte = self.read_byte()?;
        if byte >> 5 != 4 {
            return Err(CodecError::invalid_structure(format!(
                "tag {tag} must wrap an array"
            )));
        }
        self.decode_children(byte & 0x1f)
    }

    fn expect_text(&mut self, tag: u64) -> CodecResult<String> {
        let byte = self.read_byte()?;
        if byte >> 5 != 3 {
            return Err(CodecError::invalid_structure(format!(
                "tag {tag} must wrap a text string"
            )));
        }
        self.decode_text(byte & 0x1f)
    }

    fn decode_tagged(&mut self, tag: u64) -> CodecResult<Item> {
        match tag {
            TAG_DATE => Ok(Item::Open(Partial::date())),
            TAG_REF => {
                let byte = self.read_byte()?;
                if byte >> 5 != 0 {
                    return Err(CodecError::invalid_structure(
                        "reference must wrap an unsigned integer",
                    ));
                }
                let id = self.decode_unsigned(byte & 0x1f)?;
                let id = u32::try_from(id)
                    .map_err(|_| CodecError::invalid_structure("reference id out of range"))?;
                Ok(Item::Value(WireValue::Ref(id)))
            }
            TAG_SYMBOL => self
                .expect_text(tag)
                .map(|name| Item::Value(WireValue::Symbol(name))),
            TAG_BIGINT => self
                .expect_text(tag)
                .map(|digits| Item::Value(WireValue::BigInt(digits))),
            TAG_SET => {
                let len = self.expect_array_head(tag)?;
                Ok(Item::Open(Partial::new(Shape::Set, len)))
            }
            TAG_MAP => {
                let len = self.expect_pair_array(tag)?;
                Ok(Item::Open(Partial::pairs(Shape::Map, len)))
            }
            TAG_OBJECT => {
                let len = self.expect_pair_array(tag)?;
                Ok(Item::Open(Partial::pairs(Shape::Object, len)))
            }
            other => Err(CodecError::unknown_kind(format!("tag {other}"))),
        }
    }

    /// Reads a flat key/value array head and returns the pair count.
    fn expect_pair_array(&mut self, tag: u64) -> CodecResult<usize> {
        let len = self.expect_array_head(tag)?;
        if len % 2 != 0 {
            return Err(CodecError::invalid_structure(format!(
                "tag {tag} must wrap an even-length array"
            )));
        }
        Ok(len / 2)
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<WireValue> {
        match additional_info {
            20 => Ok(WireValue::Bool(false)),
            21 => Ok(WireValue::Bool(true)),
            22 => Ok(WireValue::Null),
            23 => Ok(WireValue::Absent),
            26 => {
                let bytes = self.read_bytes(4)?;
                let n = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(WireValue::Number(f64::from(n)))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let n = f64::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                Ok(WireValue::Number(n))
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unknown_kind(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Result of reading one item head.
enum Item {
    Value(WireValue),
    Open(Partial),
}

#[derive(Clone, Copy)]
enum Shape {
    List,
    Set,
    Map,
    Object,
    Date,
}

/// A container whose children are still being read.
struct Partial {
    shape: Shape,
    /// Children still expected; pairs count as two.
    remaining: usize,
    items: Vec<WireValue>,
    keys: Vec<WireKey>,
    millis: f64,
}

impl Partial {
    fn new(shape: Shape, remaining: usize) -> Self {
        Self {
            shape,
            remaining,
            items: Vec::new(),
            keys: Vec::new(),
            millis: 0.0,
        }
    }

    fn pairs(shape: Shape, len: usize) -> Self {
        Self::new(shape, len * 2)
    }

    fn date() -> Self {
        Self::new(Shape::Date, 1)
    }

    fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    fn push(&mut self, mut value: WireValue) -> CodecResult<()> {
        self.remaining -= 1;
        match self.shape {
            Shape::Date => match &value {
                WireValue::Number(millis) => self.millis = *millis,
                other => {
                    return Err(CodecError::invalid_structure(format!(
                        "date must wrap a number, found {}",
                        other.kind_name()
                    )))
                }
            },
            // Object keys sit at even positions.
            Shape::Object if self.remaining % 2 == 1 => {
                let key = match &mut value {
                    WireValue::Text(name) => WireKey::Name(std::mem::take(name)),
                    WireValue::Symbol(name) => WireKey::Symbol(std::mem::take(name)),
                    other => {
                        return Err(CodecError::invalid_structure(format!(
                            "object key must be a string or symbol, found {}",
                            other.kind_name()
                        )))
                    }
                };
                self.keys.push(key);
            }
            _ => self.items.push(value),
        }
        Ok(())
    }

    fn finish(self) -> WireValue {
        match self.shape {
            Shape::List => WireValue::List(self.items),
            Shape::Set => WireValue::Set(self.items),
            Shape::Date => WireValue::Date(self.millis),
            Shape::Map => {
                let mut entries = Vec::with_capacity(self.items.len() / 2);
                let mut items = self.items.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    entries.push((key, value));
                }
                WireValue::Map(entries)
            }
            Shape::Object => WireValue::Object(self.keys.into_iter().zip(self.items).collect()),
        }
    }
}
