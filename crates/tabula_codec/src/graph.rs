//! Graph ⇄ wire conversion with shared-node references.
//!
//! Composites are numbered in pre-order: a node gets the next id the moment
//! its encoding begins, before any child is visited. A node seen again (by
//! identity) is written as a reference to that id. The decoder replays the
//! same numbering and registers each composite before descending into it,
//! so a child referring to an ancestor resolves to the node under
//! construction.

use crate::error::{CodecError, CodecResult};
use crate::heap::{Heap, Node};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{Key, NodeId, Value};
use crate::wire::{WireKey, WireValue};
use num_bigint::BigInt;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Encode the graph reachable from `value`.
///
/// Symbols are written under their name in `symbols`; an unregistered
/// symbol gets a placeholder name that is stable for this call only.
/// Values in `blocklist` (by identity for composites) are written as
/// absent. Node ids that do not resolve in `heap` are also written as
/// absent.
pub fn encode_graph(
    heap: &Heap,
    value: &Value,
    symbols: &SymbolTable,
    blocklist: Option<&HashSet<Value>>,
) -> WireValue {
    GraphEncoder::new(heap, symbols, blocklist).encode(value)
}

/// Decode a wire graph, allocating its composites in `heap`.
///
/// # Errors
///
/// Returns [`CodecError::DecodeReferenceMissing`] for a back-reference to
/// an id not yet assigned, and [`CodecError::InvalidBigInt`] for a
/// malformed integer literal. Nodes allocated before the error remain in
/// `heap` unreferenced.
pub fn decode_graph(wire: &WireValue, heap: &mut Heap, symbols: &SymbolTable) -> CodecResult<Value> {
    GraphDecoder::new(heap, symbols).decode(wire)
}

/// Stateful encoder; ids persist across calls to [`encode`](Self::encode).
pub struct GraphEncoder<'a> {
    heap: &'a Heap,
    symbols: &'a SymbolTable,
    blocklist: Option<&'a HashSet<Value>>,
    refs: HashMap<NodeId, u32>,
    next_ref: u32,
    placeholders: HashMap<Symbol, String>,
}

impl<'a> GraphEncoder<'a> {
    /// Creates an encoder over `heap`.
    pub fn new(
        heap: &'a Heap,
        symbols: &'a SymbolTable,
        blocklist: Option<&'a HashSet<Value>>,
    ) -> Self {
        Self {
            heap,
            symbols,
            blocklist,
            refs: HashMap::new(),
            next_ref: 0,
            placeholders: HashMap::new(),
        }
    }

    /// Number of composites assigned an id so far.
    pub fn composites_seen(&self) -> u32 {
        self.next_ref
    }

    /// Encodes one value.
    ///
    /// Nodes under construction are kept on an explicit stack, so graph
    /// depth is bounded by memory rather than by the call stack.
    pub fn encode(&mut self, value: &Value) -> WireValue {
        let mut open: Vec<OpenNode<'a>> = match self.visit(value) {
            Visit::Done(wire) => return wire,
            Visit::Open(node) => vec![node],
        };
        loop {
            let Some(top) = open.last_mut() else {
                return WireValue::Absent;
            };
            if let Some(child) = top.next_child(self) {
                match self.visit(child) {
                    Visit::Done(wire) => top.done.push(wire),
                    Visit::Open(node) => open.push(node),
                }
                continue;
            }
            let wire = match open.pop() {
                Some(finished) => finished.finish(),
                None => return WireValue::Absent,
            };
            match open.last_mut() {
                Some(parent) => parent.done.push(wire),
                None => return wire,
            }
        }
    }

    /// Encodes a scalar, back-reference or date outright; numbers and opens
    /// any other composite.
    fn visit(&mut self, value: &Value) -> Visit<WireValue, OpenNode<'a>> {
        if self.blocklist.is_some_and(|b| b.contains(value)) {
            return Visit::Done(WireValue::Absent);
        }
        let id = match value {
            Value::Undefined => return Visit::Done(WireValue::Absent),
            Value::Null => return Visit::Done(WireValue::Null),
            Value::Bool(b) => return Visit::Done(WireValue::Bool(*b)),
            Value::Number(n) => return Visit::Done(WireValue::Number(*n)),
            Value::Text(s) => return Visit::Done(WireValue::Text(s.clone())),
            Value::BigInt(n) => return Visit::Done(WireValue::BigInt(n.to_string())),
            Value::Symbol(s) => return Visit::Done(WireValue::Symbol(self.symbol_name(s))),
            Value::Node(id) => *id,
        };
        if let Some(existing) = self.refs.get(&id) {
            return Visit::Done(WireValue::Ref(*existing));
        }
        let heap = self.heap;
        let Some(node) = heap.node(id) else {
            return Visit::Done(WireValue::Absent);
        };
        self.refs.insert(id, self.next_ref);
        self.next_ref += 1;

        match node {
            Node::Date(millis) => Visit::Done(WireValue::Date(*millis)),
            _ => Visit::Open(OpenNode {
                node,
                next: 0,
                done: Vec::new(),
                keys: Vec::new(),
            }),
        }
    }

    fn wire_key(&mut self, key: &Key) -> WireKey {
        match key {
            Key::Name(name) => WireKey::Name(name.clone()),
            Key::Symbol(sym) => WireKey::Symbol(self.symbol_name(sym)),
        }
    }

    fn symbol_name(&mut self, symbol: &Symbol) -> String {
        if let Some(name) = self.symbols.name_of(symbol) {
            return name.to_string();
        }
        let next = self.placeholders.len();
        self.placeholders
            .entry(symbol.clone())
            .or_insert_with(|| {
                format!(
                    "@@unregistered:{next}:{}",
                    symbol.description().unwrap_or_default()
                )
            })
            .clone()
    }
}

/// Stateful decoder; ids persist across calls to [`decode`](Self::decode).
pub struct GraphDecoder<'a> {
    heap: &'a mut Heap,
    symbols: &'a SymbolTable,
    refs: Vec<NodeId>,
    minted: HashMap<String, Symbol>,
}

impl<'a> GraphDecoder<'a> {
    /// Creates a decoder allocating into `heap`.
    pub fn new(heap: &'a mut Heap, symbols: &'a SymbolTable) -> Self {
        Self {
            heap,
            symbols,
            refs: Vec::new(),
            minted: HashMap::new(),
        }
    }

    /// Decodes one value.
    ///
    /// # Errors
    ///
    /// Besides unresolved references and malformed integers, a set with a
    /// repeated element, or a map or object with a repeated key, is
    /// [`CodecError::InvalidStructure`].
    pub fn decode<'w>(&mut self, wire: &'w WireValue) -> CodecResult<Value> {
        let mut open: Vec<Filling<'w>> = match self.visit(wire)? {
            Visit::Done(value) => return Ok(value),
            Visit::Open(filling) => vec![filling],
        };
        loop {
            let Some(top) = open.last_mut() else {
                return Ok(Value::Undefined);
            };
            if let Some(child) = top.next_child(self) {
                match self.visit(child)? {
                    Visit::Done(value) => top.done.push(value),
                    Visit::Open(filling) => open.push(filling),
                }
                continue;
            }
            let value = match open.pop() {
                Some(finished) => self.fill(finished)?,
                None => return Ok(Value::Undefined),
            };
            match open.last_mut() {
                Some(parent) => parent.done.push(value),
                None => return Ok(value),
            }
        }
    }

    /// Decodes a scalar or reference outright; registers and opens a
    /// composite.
    fn visit<'w>(&mut self, wire: &'w WireValue) -> CodecResult<Visit<Value, Filling<'w>>> {
        let empty = match wire {
            WireValue::Absent => return Ok(Visit::Done(Value::Undefined)),
            WireValue::Null => return Ok(Visit::Done(Value::Null)),
            WireValue::Bool(b) => return Ok(Visit::Done(Value::Bool(*b))),
            WireValue::Number(n) => return Ok(Visit::Done(Value::Number(*n))),
            WireValue::Text(s) => return Ok(Visit::Done(Value::Text(s.clone()))),
            WireValue::BigInt(digits) => return Ok(Visit::Done(Value::BigInt(parse_bigint(digits)?))),
            WireValue::Symbol(name) => return Ok(Visit::Done(Value::Symbol(self.symbol(name)))),
            WireValue::Ref(id) => {
                return match self.refs.get(*id as usize) {
                    Some(node) => Ok(Visit::Done(Value::Node(*node))),
                    None => Err(CodecError::DecodeReferenceMissing { id: *id }),
                }
            }
            WireValue::Date(millis) => {
                return Ok(Visit::Done(Value::Node(self.register(Node::Date(*millis)))))
            }
            WireValue::List(_) => Node::List(Vec::new()),
            WireValue::Set(_) => Node::Set(Vec::new()),
            WireValue::Map(_) => Node::Map(Vec::new()),
            WireValue::Object(_) => Node::Object(Vec::new()),
        };
        Ok(Visit::Open(Filling {
            id: self.register(empty),
            wire,
            next: 0,
            done: Vec::new(),
            keys: Vec::new(),
        }))
    }

    fn register(&mut self, node: Node) -> NodeId {
        let id = self.heap.alloc(node);
        self.refs.push(id);
        id
    }

    /// Stores a finished composite in the slot registered for it.
    fn fill(&mut self, filling: Filling<'_>) -> CodecResult<Value> {
        let Filling {
            id,
            wire,
            done,
            keys,
            ..
        } = filling;
        let node = match wire {
            WireValue::Set(_) => {
                if !all_distinct(&done) {
                    return Err(CodecError::invalid_structure("set holds a repeated element"));
                }
                Node::Set(done)
            }
            WireValue::Map(_) => {
                let mut entries = Vec::with_capacity(done.len() / 2);
                let mut items = done.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    entries.push((key, value));
                }
                if !all_distinct(entries.iter().map(|(key, _)| key)) {
                    return Err(CodecError::invalid_structure("map holds a repeated key"));
                }
                Node::Map(entries)
            }
            WireValue::Object(_) => {
                if !all_distinct(&keys) {
                    return Err(CodecError::invalid_structure("object holds a repeated field"));
                }
                Node::Object(keys.into_iter().zip(done).collect())
            }
            _ => Node::List(done),
        };
        if let Some(slot) = self.heap.node_mut(id) {
            *slot = node;
        }
        Ok(Value::Node(id))
    }

    fn key(&mut self, key: &WireKey) -> Key {
        match key {
            WireKey::Name(name) => Key::Name(name.clone()),
            WireKey::Symbol(name) => Key::Symbol(self.symbol(name)),
        }
    }

    fn symbol(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.symbols.symbol(name) {
            return symbol.clone();
        }
        self.minted
            .entry(name.to_string())
            .or_insert_with(|| Symbol::new(name))
            .clone()
    }
}

/// Outcome of visiting one value: finished, or a composite to descend
/// into.
enum Visit<T, O> {
    Done(T),
    Open(O),
}

/// A heap node whose wire form is being built.
struct OpenNode<'h> {
    node: &'h Node,
    next: usize,
    done: Vec<WireValue>,
    keys: Vec<WireKey>,
}

impl<'h> OpenNode<'h> {
    /// The next child in wire order. Map keys come before their values;
    /// object keys are converted as their values are reached.
    fn next_child(&mut self, encoder: &mut GraphEncoder<'h>) -> Option<&'h Value> {
        let i = self.next;
        let node: &'h Node = self.node;
        let child = match node {
            Node::List(items) | Node::Set(items) => items.get(i),
            Node::Map(entries) => entries
                .get(i / 2)
                .map(|(key, value)| if i % 2 == 0 { key } else { value }),
            Node::Object(fields) => fields.get(i).map(|(key, value)| {
                self.keys.push(encoder.wire_key(key));
                value
            }),
            Node::Date(_) => None,
        }?;
        self.next += 1;
        Some(child)
    }

    fn finish(self) -> WireValue {
        match self.node {
            Node::Set(_) => WireValue::Set(self.done),
            Node::Map(_) => {
                let mut entries = Vec::with_capacity(self.done.len() / 2);
                let mut items = self.done.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    entries.push((key, value));
                }
                WireValue::Map(entries)
            }
            Node::Object(_) => WireValue::Object(self.keys.into_iter().zip(self.done).collect()),
            Node::List(_) | Node::Date(_) => WireValue::List(self.done),
        }
    }
}

/// A registered composite whose children are being decoded.
struct Filling<'w> {
    id: NodeId,
    wire: &'w WireValue,
    next: usize,
    done: Vec<Value>,
    keys: Vec<Key>,
}

impl<'w> Filling<'w> {
    fn next_child(&mut self, decoder: &mut GraphDecoder<'_>) -> Option<&'w WireValue> {
        let i = self.next;
        let wire: &'w WireValue = self.wire;
        let child = match wire {
            WireValue::List(items) | WireValue::Set(items) => items.get(i),
            WireValue::Map(entries) => entries
                .get(i / 2)
                .map(|(key, value)| if i % 2 == 0 { key } else { value }),
            WireValue::Object(fields) => fields.get(i).map(|(key, value)| {
                self.keys.push(decoder.key(key));
                value
            }),
            _ => None,
        }?;
        self.next += 1;
        Some(child)
    }
}

fn all_distinct<'v, T: Hash + Eq + 'v>(items: impl IntoIterator<Item = &'v T>) -> bool {
    let mut seen = HashSet::new();
    items.into_iter().all(|item| seen.insert(item))
}

fn parse_bigint(digits: &str) -> CodecResult<BigInt> {
    digits.parse::<BigInt>().map_err(|_| CodecError::InvalidBigInt {
        literal: digits.to_string(),
    })
}
