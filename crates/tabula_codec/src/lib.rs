//! # tabula Codec
//!
//! Value model and cycle-safe serialization for tabula.
//!
//! This crate provides:
//! - [`Value`], the closed set of storable kinds, with composites held in a
//!   [`Heap`] arena and referenced by [`NodeId`]
//! - [`Symbol`] tokens and the [`SymbolTable`] that names them on the wire
//! - [`encode_graph`] / [`decode_graph`], which turn an arbitrarily shared or
//!   cyclic graph into a [`WireValue`] and back, preserving node identity
//! - [`to_bytes`] / [`from_bytes`], a CBOR encoding of the wire form
//!
//! ## Usage
//!
//! ```
//! use tabula_codec::{decode_bytes, encode_bytes, structurally_equal, Heap, SymbolTable, Value};
//!
//! let mut heap = Heap::new();
//! let root = heap.object([("name", Value::from("John"))]);
//! let id = root.as_node().unwrap();
//! heap.set_field(id, "self", root.clone());
//!
//! let symbols = SymbolTable::new();
//! let bytes = encode_bytes(&heap, &root, &symbols);
//!
//! let mut restored = Heap::new();
//! let decoded = decode_bytes(&bytes, &mut restored, &symbols).unwrap();
//! assert!(structurally_equal(&heap, &root, &restored, &decoded));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod graph;
mod heap;
mod symbol;
mod value;
mod wire;

pub use decoder::{from_bytes, WireDecoder};
pub use encoder::{to_bytes, WireEncoder};
pub use error::{CodecError, CodecResult};
pub use graph::{decode_graph, encode_graph, GraphDecoder, GraphEncoder};
pub use heap::{structurally_equal, Heap, Node, NodeKind};
pub use num_bigint::BigInt;
pub use symbol::{Symbol, SymbolTable};
pub use value::{Key, NodeId, Value};
pub use wire::{WireKey, WireValue};

/// Trait for types that can be encoded to wire bytes.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> Vec<u8>;
}

/// Trait for types that can be decoded from wire bytes.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for WireValue {
    fn encode(&self) -> Vec<u8> {
        to_bytes(self)
    }
}

impl Decode for WireValue {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_bytes(bytes)
    }
}

/// Encode the graph reachable from `value` straight to bytes.
pub fn encode_bytes(heap: &Heap, value: &Value, symbols: &SymbolTable) -> Vec<u8> {
    to_bytes(&encode_graph(heap, value, symbols, None))
}

/// Decode bytes produced by [`encode_bytes`] into `heap`.
///
/// # Errors
///
/// Returns an error if the bytes are malformed or reference an unknown id.
pub fn decode_bytes(bytes: &[u8], heap: &mut Heap, symbols: &SymbolTable) -> CodecResult<Value> {
    decode_graph(&from_bytes(bytes)?, heap, symbols)
}
