//! Dump command implementation.

use super::open_snapshot;
use crate::Format;
use serde::Serialize;
use serde_json::{json, Map};
use std::collections::HashSet;
use std::path::Path;
use tabula_codec::{Heap, Key, Node, NodeId, Value};
use tabula_core::Store;

/// A record rendered for output.
#[derive(Debug, Serialize)]
pub struct RecordDump {
    /// Record identifier.
    pub id: u64,
    /// Heap node of the record root.
    pub node: u32,
    /// The record as JSON. Nodes already printed earlier in the same
    /// record appear as `{"$ref": node}`, and nodes nested deeper than
    /// [`MAX_DEPTH`] as `{"$truncated": node}`.
    pub value: serde_json::Value,
}

/// Deepest container level rendered.
pub const MAX_DEPTH: usize = 64;

/// Renders up to `limit` records of `table`.
pub fn dump(
    store: &Store,
    table: &str,
    limit: Option<usize>,
) -> Result<Vec<RecordDump>, Box<dyn std::error::Error>> {
    let table = store
        .table(table)
        .ok_or_else(|| format!("Table not found: {}", table))?;
    let records = table
        .records()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(id, node)| {
            let mut seen = HashSet::new();
            RecordDump {
                id: id.as_u64(),
                node: node.0,
                value: node_to_json(store.heap(), node, &mut seen, 0),
            }
        })
        .collect();
    Ok(records)
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    table: &str,
    limit: Option<usize>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_snapshot(path)?;
    let records = dump(&store, table, limit)?;

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Format::Text => {
            print_text_output(table, &records);
        }
    }

    Ok(())
}

fn value_to_json(heap: &Heap, value: &Value, seen: &mut HashSet<NodeId>, depth: usize) -> serde_json::Value {
    match value {
        Value::Undefined => json!({ "$undefined": true }),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Number(n) if n.is_finite() => json!(n),
        Value::Number(n) => json!({ "$number": n.to_string() }),
        Value::Text(s) => json!(s),
        Value::BigInt(n) => json!({ "$bigint": n.to_string() }),
        Value::Symbol(s) => json!({ "$symbol": s.description().unwrap_or_default() }),
        Value::Node(node) => node_to_json(heap, *node, seen, depth),
    }
}

fn node_to_json(heap: &Heap, id: NodeId, seen: &mut HashSet<NodeId>, depth: usize) -> serde_json::Value {
    if depth >= MAX_DEPTH {
        return json!({ "$truncated": id.0 });
    }
    if !seen.insert(id) {
        return json!({ "$ref": id.0 });
    }
    let depth = depth + 1;
    let Some(node) = heap.node(id) else {
        return json!({ "$missing": id.0 });
    };
    match node {
        Node::Object(fields) => {
            let mut out = Map::new();
            for (key, value) in fields {
                let name = match key {
                    Key::Name(name) => name.clone(),
                    Key::Symbol(symbol) => format!("@{}", symbol.description().unwrap_or("symbol")),
                };
                out.insert(name, value_to_json(heap, value, seen, depth));
            }
            serde_json::Value::Object(out)
        }
        Node::List(items) => items.iter().map(|v| value_to_json(heap, v, seen, depth)).collect(),
        Node::Set(items) => {
            let items: Vec<_> = items.iter().map(|v| value_to_json(heap, v, seen, depth)).collect();
            json!({ "$set": items })
        }
        Node::Map(entries) => {
            let entries: Vec<_> = entries
                .iter()
                .map(|(k, v)| json!([value_to_json(heap, k, seen, depth), value_to_json(heap, v, seen, depth)]))
                .collect();
            json!({ "$map": entries })
        }
        Node::Date(ms) => json!({ "$date": ms }),
    }
}

fn print_text_output(table: &str, records: &[RecordDump]) {
    println!("Records of {} ({} shown)", table, records.len());
    println!("================");
    println!();

    for record in records {
        println!("[{:>6}] #{} {}", record.id, record.node, record.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_testkit::prelude::*;

    #[test]
    fn dump_respects_limit() {
        let (store, _) = scenarios::populated_users(5);
        let records = dump(&store, USERS, Some(2)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].value["name"], "user1");
    }

    #[test]
    fn cycles_render_as_refs() {
        let (store, handles) = scenarios::friend_ring(2);
        let records = dump(&store, USERS, None).unwrap();
        let first = &records[0].value;
        assert_eq!(first["friend"]["name"], "user1");
        assert_eq!(first["friend"]["friend"]["$ref"], handles[0].node().0);
    }

    #[test]
    fn deep_records_are_truncated() {
        let mut store = users_store();
        let mut inner = Value::from("bottom");
        for _ in 0..100_000 {
            inner = store.heap_mut().list([inner]);
        }
        let user = store.heap_mut().object([("nest", inner)]);
        store.add_record(USERS, user).unwrap();

        let records = dump(&store, USERS, None).unwrap();
        let mut value = &records[0].value["nest"];
        for _ in 1..MAX_DEPTH {
            value = &value[0];
        }
        assert!(value["$truncated"].is_u64());
    }

    #[test]
    fn unknown_table_is_an_error() {
        let store = users_store();
        assert!(dump(&store, "missing", None).is_err());
    }

    #[test]
    fn containers_are_tagged() {
        let mut store = users_store();
        let heap = store.heap_mut();
        let set = heap.set([Value::from(1)]);
        let map = heap.map([(Value::from("k"), Value::Null)]);
        let user = heap.object([("set", set), ("map", map), ("nan", Value::Number(f64::NAN))]);
        store.add_record(USERS, user).unwrap();

        let records = dump(&store, USERS, None).unwrap();
        let value = &records[0].value;
        assert_eq!(value["set"]["$set"][0], 1.0);
        assert_eq!(value["map"]["$map"][0][0], "k");
        assert_eq!(value["nan"]["$number"], "NaN");
    }
}
