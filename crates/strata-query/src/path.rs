//! Dotted-path access into JSON payloads.
//!
//! Query fields address values inside an object's `data` column with paths
//! like `"geometry.bbox.0"`. Path segments index into maps by key and into
//! arrays by decimal position.

use serde_json::{Map, Value};

/// Extract the value at a dotted path. `None` if any segment is missing.
pub fn get<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Insert a value at a dotted path, creating intermediate objects.
///
/// Used to reconstruct projected objects from selected fields. Array
/// segments are not materialized; a numeric segment creates an object key,
/// which is good enough for read-side projection.
pub fn set(data: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else { return };
    let mut current = data;
    for segment in segments {
        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            // a scalar in the way is replaced; projection paths never
            // overlap with scalar-valued prefixes in practice
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else { return };
        current = next;
    }
    current.insert(last.to_owned(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn get_top_level() {
        let data = map(json!({"a": 1}));
        assert_eq!(get(&data, "a"), Some(&json!(1)));
    }

    #[test]
    fn get_nested() {
        let data = map(json!({"a": {"b": {"c": "deep"}}}));
        assert_eq!(get(&data, "a.b.c"), Some(&json!("deep")));
    }

    #[test]
    fn get_array_index() {
        let data = map(json!({"items": [10, 20, 30]}));
        assert_eq!(get(&data, "items.1"), Some(&json!(20)));
    }

    #[test]
    fn get_missing_returns_none() {
        let data = map(json!({"a": {"b": 1}}));
        assert_eq!(get(&data, "a.c"), None);
        assert_eq!(get(&data, "z"), None);
        assert_eq!(get(&data, "a.b.c"), None); // scalar mid-path
    }

    #[test]
    fn set_creates_intermediates() {
        let mut data = Map::new();
        set(&mut data, "a.b.c", json!(42));
        assert_eq!(get(&data, "a.b.c"), Some(&json!(42)));
    }

    #[test]
    fn set_top_level() {
        let mut data = Map::new();
        set(&mut data, "x", json!("y"));
        assert_eq!(data["x"], json!("y"));
    }
}
