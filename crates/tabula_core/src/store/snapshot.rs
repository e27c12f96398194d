//! Whole-store snapshots.
//!
//! A snapshot is a single wire value:
//!
//! ```text
//! { "version": n,
//!   "tables": Map(name -> { "lastId": bigint,
//!                           "records": [record, ...],
//!                           "indices": Map(column -> Map(value -> Set[record, ...])) }) }
//! ```
//!
//! The envelope is written directly in wire form. Records, bucket values
//! and bucket members are encoded with one [`GraphEncoder`], so a bucket
//! member is a back-reference to the record encoded before it and values
//! shared between records stay shared. [`Store::load`] decodes the same
//! leaves in the same order with one [`GraphDecoder`].

use super::Store;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::HashIndex;
use crate::table::Table;
use crate::types::RecordId;
use std::collections::BTreeMap;
use tabula_codec::{
    from_bytes, to_bytes, GraphDecoder, GraphEncoder, Heap, Key, Node, Symbol, Value, WireKey,
    WireValue,
};
use tracing::{info, warn};

const VERSION: &str = "version";
const TABLES: &str = "tables";
const LAST_ID: &str = "lastId";
const RECORDS: &str = "records";
const INDICES: &str = "indices";

/// A table's leaves as decoded, before record identifiers are resolved.
struct DecodedTable {
    name: String,
    last_id: RecordId,
    records: Vec<Value>,
    indices: Vec<(String, Vec<(Value, Vec<Value>)>)>,
}

impl Store {
    /// Encodes the whole store.
    ///
    /// Caller symbols registered in the configuration keep their identity
    /// across [`load`](Self::load); the record identifier field is always
    /// written under [`RECORD_ID_SYMBOL_NAME`](crate::config::RECORD_ID_SYMBOL_NAME).
    pub fn serialize(&self) -> Vec<u8> {
        let bytes = to_bytes(&self.snapshot_wire());
        info!(
            tables = self.tables.len(),
            bytes = bytes.len(),
            "store serialized"
        );
        bytes
    }

    /// The snapshot in wire form.
    pub fn snapshot_wire(&self) -> WireValue {
        let symbols = self.config.snapshot_symbols();
        let mut encoder = GraphEncoder::new(&self.heap, &symbols, None);

        let mut tables = Vec::with_capacity(self.tables.len());
        for table in self.tables.values() {
            let records: Vec<WireValue> = table
                .records()
                .map(|(_, node)| encoder.encode(&Value::Node(node)))
                .collect();

            let mut indices = Vec::new();
            for column in table.indexed_columns() {
                let Some(index) = table.index(column) else {
                    continue;
                };
                let mut buckets: Vec<_> = index.buckets().collect();
                buckets.sort_by_key(|(_, members)| members.iter().next().copied());
                let buckets = buckets
                    .into_iter()
                    .map(|(value, members)| {
                        let key = encoder.encode(value);
                        let members = members
                            .iter()
                            .filter_map(|id| table.node_of(*id))
                            .map(|node| encoder.encode(&Value::Node(node)))
                            .collect();
                        (key, WireValue::Set(members))
                    })
                    .collect();
                indices.push((WireValue::Text(column.to_string()), WireValue::Map(buckets)));
            }

            let body = WireValue::Object(vec![
                (
                    WireKey::Name(LAST_ID.into()),
                    WireValue::BigInt(table.last_id().as_u64().to_string()),
                ),
                (WireKey::Name(RECORDS.into()), WireValue::List(records)),
                (WireKey::Name(INDICES.into()), WireValue::Map(indices)),
            ]);
            tables.push((WireValue::Text(table.name().to_string()), body));
        }

        WireValue::Object(vec![
            (
                WireKey::Name(VERSION.into()),
                WireValue::Number(f64::from(self.config.format_version)),
            ),
            (WireKey::Name(TABLES.into()), WireValue::Map(tables)),
        ])
    }

    /// Replaces the store's contents with a snapshot.
    ///
    /// Tables, records, indices, counters and the heap are replaced
    /// wholesale. Open transactions are discarded and cached handles are
    /// dropped. Hooks and subscribers are kept. On error the store is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// A codec error for malformed bytes or an unresolved back-reference,
    /// `InvalidSnapshot` for a well-formed value that is not a snapshot of
    /// this format version.
    pub fn load(&mut self, bytes: &[u8]) -> StoreResult<()> {
        let wire = from_bytes(bytes)?;
        let symbols = self.config.snapshot_symbols();
        let mut heap = Heap::new();

        let decoded = {
            let mut decoder = GraphDecoder::new(&mut heap, &symbols);
            decode_envelope(&wire, &mut decoder, self.config.format_version)?
        };

        let mut tables = BTreeMap::new();
        for table in decoded {
            let table = build_table(table, &heap)?;
            tables.insert(table.name().to_string(), table);
        }

        let discarded = self.log.discard_all();
        if discarded > 0 {
            warn!(frames = discarded, "open transactions discarded by load");
        }
        self.heap = heap;
        self.tables = tables;
        self.handles.clear();
        info!(
            tables = self.tables.len(),
            bytes = bytes.len(),
            nodes = self.heap.len(),
            "store loaded"
        );
        Ok(())
    }

    /// Builds a store from a snapshot.
    pub fn from_snapshot(bytes: &[u8], config: StoreConfig) -> StoreResult<Self> {
        let mut store = Self::with_config(config);
        store.load(bytes)?;
        Ok(store)
    }
}

fn decode_envelope(
    wire: &WireValue,
    decoder: &mut GraphDecoder<'_>,
    version: u16,
) -> StoreResult<Vec<DecodedTable>> {
    match wire.field(VERSION) {
        Some(WireValue::Number(n)) if *n == f64::from(version) => {}
        Some(WireValue::Number(n)) => {
            return Err(StoreError::invalid_snapshot(format!(
                "format version {n} is not supported (expected {version})"
            )))
        }
        _ => return Err(StoreError::invalid_snapshot("missing format version")),
    }
    let Some(WireValue::Map(tables)) = wire.field(TABLES) else {
        return Err(StoreError::invalid_snapshot("missing table map"));
    };

    let mut out = Vec::with_capacity(tables.len());
    for (name, body) in tables {
        let WireValue::Text(name) = name else {
            return Err(StoreError::invalid_snapshot("table name is not a string"));
        };
        let last_id = match body.field(LAST_ID) {
            Some(WireValue::BigInt(text)) => text.parse::<u64>().map(RecordId::new).map_err(|_| {
                StoreError::invalid_snapshot(format!("table {name}: bad last id {text}"))
            })?,
            _ => {
                return Err(StoreError::invalid_snapshot(format!(
                    "table {name}: missing last id"
                )))
            }
        };
        let Some(WireValue::List(records)) = body.field(RECORDS) else {
            return Err(StoreError::invalid_snapshot(format!(
                "table {name}: missing records"
            )));
        };
        let records = records
            .iter()
            .map(|record| decoder.decode(record))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(WireValue::Map(indices)) = body.field(INDICES) else {
            return Err(StoreError::invalid_snapshot(format!(
                "table {name}: missing indices"
            )));
        };
        let mut decoded_indices = Vec::with_capacity(indices.len());
        for (column, buckets) in indices {
            let (WireValue::Text(column), WireValue::Map(buckets)) = (column, buckets) else {
                return Err(StoreError::invalid_snapshot(format!(
                    "table {name}: malformed index"
                )));
            };
            let mut decoded_buckets = Vec::with_capacity(buckets.len());
            for (value, members) in buckets {
                let WireValue::Set(members) = members else {
                    return Err(StoreError::invalid_snapshot(format!(
                        "{name}.{column}: bucket members are not a set"
                    )));
                };
                let value = decoder.decode(value)?;
                let members = members
                    .iter()
                    .map(|member| decoder.decode(member))
                    .collect::<Result<Vec<_>, _>>()?;
                decoded_buckets.push((value, members));
            }
            decoded_indices.push((column.clone(), decoded_buckets));
        }

        out.push(DecodedTable {
            name: name.clone(),
            last_id,
            records,
            indices: decoded_indices,
        });
    }
    Ok(out)
}

fn build_table(decoded: DecodedTable, heap: &Heap) -> StoreResult<Table> {
    let name = decoded.name;
    let mut table = Table::new(&name);
    let id_key = Key::Symbol(Symbol::record_id());

    for record in &decoded.records {
        let node = record.as_node().ok_or_else(|| {
            StoreError::invalid_snapshot(format!("table {name}: record is not an object"))
        })?;
        let id = match heap.node(node) {
            Some(object @ Node::Object(_)) => match object.field(&id_key) {
                Some(Value::BigInt(id)) => u64::try_from(id).map(RecordId::new).map_err(|_| {
                    StoreError::invalid_snapshot(format!("table {name}: bad record id {id}"))
                })?,
                _ => {
                    return Err(StoreError::invalid_snapshot(format!(
                        "table {name}: record without id"
                    )))
                }
            },
            _ => {
                return Err(StoreError::invalid_snapshot(format!(
                    "table {name}: record is not an object"
                )))
            }
        };
        if table.node_of(id).is_some() {
            return Err(StoreError::invalid_snapshot(format!(
                "table {name}: duplicate record id {id}"
            )));
        }
        table.attach(id, node, heap);
    }
    table.set_last_id(decoded.last_id);

    for (column, buckets) in decoded.indices {
        let mut index = HashIndex::new(column.as_str());
        for (value, members) in buckets {
            for member in members {
                let id = member
                    .as_node()
                    .and_then(|node| table.record_of(node))
                    .ok_or_else(|| {
                        StoreError::invalid_snapshot(format!(
                            "{name}.{column}: bucket member is not a record"
                        ))
                    })?;
                index.insert(&value, id);
            }
        }
        table.install_index(index);
    }
    Ok(table)
}
