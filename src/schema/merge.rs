//! Definition merging
//!
//! `merge_definitions(base, overlay)` deep-merges two definitions. The
//! overlay wins on conflicting keys, nested objects merge recursively and
//! `required` arrays are unioned (base order first, duplicates dropped).
//! Argument order is precedence; the operation is not commutative.

use serde_json::{Map, Value};

pub fn merge_definitions(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_objects(base, overlay)),
        _ => overlay.clone(),
    }
}

fn merge_objects(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let combined = match (key.as_str(), merged.get(key), value) {
            ("required", Some(Value::Array(existing)), Value::Array(extra)) => {
                Value::Array(union(existing, extra))
            }
            (_, Some(existing @ Value::Object(_)), Value::Object(_)) => {
                merge_definitions(existing, value)
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

fn union(first: &[Value], second: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
