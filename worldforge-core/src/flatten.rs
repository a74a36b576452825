// Normalizes node payloads that wrap type-specific fields in a nested
// `properties` bag into one flat record.

use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{Node, NodeData};

/// Key of the nested property bag.
pub const PROPERTIES_KEY: &str = "properties";

/// Typed fields of [`NodeData`]; a nested bag may override them.
const TYPED_KEYS: [&str; 4] = ["type", "name", "description", "connectionDirection"];

/// Merge a nested `properties` object into `map` and drop the wrapper.
///
/// Nested keys win over flat keys of the same name. Repeats until no object
/// `properties` remains, so the result is a fixed point. A non-object
/// `properties` value is ordinary data and is left alone.
/// Returns whether anything was hoisted.
pub fn hoist_properties(map: &mut Map<String, Value>) -> bool {
    let mut hoisted = false;
    while matches!(map.get(PROPERTIES_KEY), Some(Value::Object(_))) {
        if let Some(Value::Object(nested)) = map.remove(PROPERTIES_KEY) {
            for (key, value) in nested {
                map.insert(key, value);
            }
            hoisted = true;
        }
    }
    hoisted
}

/// Flatten an untrusted JSON node, returning a new value.
///
/// Values that are not objects, or whose `data` is not an object, come back
/// unchanged.
pub fn flatten_value(node: &Value) -> Value {
    let mut out = node.clone();
    if let Some(Value::Object(data)) = out.get_mut("data") {
        hoist_properties(data);
    }
    out
}

/// Flatten a typed node.
///
/// A nested typed field that does not parse is dropped on its own; the
/// node keeps its current value for that field and every other nested key
/// is still hoisted.
pub fn flatten_node(mut node: Node) -> Node {
    if !matches!(node.data.extra.get(PROPERTIES_KEY), Some(Value::Object(_))) {
        return node;
    }

    let original = match serde_json::to_value(&node.data) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let mut merged = original.clone();
    hoist_properties(&mut merged);

    for key in TYPED_KEYS {
        let Some(value) = merged.get(key) else {
            continue;
        };
        if original.get(key) == Some(value) || typed_value_fits(&original, key, value) {
            continue;
        }
        debug!(node_id = %node.id, key, "Dropping unparseable nested field");
        match original.get(key) {
            Some(kept) => merged.insert(key.to_string(), kept.clone()),
            None => merged.remove(key),
        };
    }

    match serde_json::from_value::<NodeData>(Value::Object(merged)) {
        Ok(data) => node.data = data,
        Err(e) => debug!(node_id = %node.id, error = %e, "Leaving node unflattened"),
    }
    node
}

/// Whether `value` is acceptable for the typed field `key` of `base`.
fn typed_value_fits(base: &Map<String, Value>, key: &str, value: &Value) -> bool {
    let mut candidate = base.clone();
    candidate.remove(PROPERTIES_KEY);
    candidate.insert(key.to_string(), value.clone());
    serde_json::from_value::<NodeData>(Value::Object(candidate)).is_ok()
}
